//! Integration tests for the `sessiongate` crate.
//!
//! - `e2e` - Scenarios through the command handlers and the engine
//! - `unit` - Error types and exit-code mapping

mod common;
mod e2e;
mod unit;
