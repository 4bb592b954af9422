//! Core types shared by the whole pipeline: the error type, the checklist
//! and extracted-field records, and validator configuration.

mod config;
mod error;
mod types;

pub use config::*;
pub use error::*;
pub use types::*;
