//! Core domain + application logic for the freda relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and PostgreSQL
//! live behind ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod state;
pub mod storage;

pub use errors::{Error, Result};
