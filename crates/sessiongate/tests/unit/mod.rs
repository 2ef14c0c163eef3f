//! Focused tests of the `sessiongate` crate's public error types.

pub mod error_handling_test;
