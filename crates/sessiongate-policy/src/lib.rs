//! # sessiongate-policy
//!
//! Session registry, spend accounting and operation validation for the
//! `SessionGate` session-key policy engine.
//!
//! ## Internal Crate Warning
//!
//! **This crate is an internal implementation detail of `sessiongate`.** Its
//! API is unstable and may change between any versions.
//!
//! ## Modules
//!
//! - [`registry`] - The `SessionRegistry` trait and an in-memory backend
//! - [`store`] - Durable `SQLite` registry with an LRU read cache
//! - [`accountant`] - Pure window, ceiling and refresh arithmetic
//! - [`validator`] - Check-then-commit of transfer requests
//! - [`engine`] - Owner operations, queries and authorization entry points
//!
//! ## Evaluation Order
//!
//! A transfer is checked against its policy in a fixed order:
//!
//! 1. **Asset** - a zero-address token is never valid
//! 2. **Existence** - no policy means `PolicyNotFound`, never `Expired`
//! 3. **Window** - `valid_after <= now < valid_until`
//! 4. **Ceiling** - the amount must fit the remaining or refreshed headroom
//!
//! Only an admitted transfer changes stored state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod accountant;
pub mod engine;
pub mod registry;
pub mod store;
pub mod validator;

pub use accountant::{evaluate, headroom, status, Evaluation};
pub use engine::SessionEngine;
pub use registry::{InMemoryRegistry, SessionRegistry};
pub use store::SqliteRegistry;
pub use validator::OperationValidator;
