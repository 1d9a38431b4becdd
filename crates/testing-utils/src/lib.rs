//! # Scheduler Testing Utils
//!
//! Shared testing utilities for the priority scheduler workspace.
//!
//! ## Features
//!
//! - **Mock Broker**: records every send/pop/read and supports failure injection
//! - **Mock Repositories**: in-memory schedule, task log and device history stores
//! - **Mock Handlers**: task handlers with scripted outcomes
//! - **Manual Clock**: deterministic time for recurrence and visibility tests
//! - **Test Data Builders**: envelopes and schedule definitions with sensible defaults
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! scheduler-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust
//! use scheduler_testing_utils::{EnvelopeBuilder, MockBroker};
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
