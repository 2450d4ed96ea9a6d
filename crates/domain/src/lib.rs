//! Shared types for the chatrelay workspace: the error enum, turn and
//! prompt models, and the configuration tree.

pub mod config;
pub mod error;
pub mod prompt;
pub mod turn;

pub use error::{Error, Result};
