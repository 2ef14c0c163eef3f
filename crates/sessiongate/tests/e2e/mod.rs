//! End-to-end tests: owner operations, authorization, persistence and audit.

pub mod audit_test;
pub mod authorize_flow_test;
pub mod persistence_test;
pub mod scenario_test;
