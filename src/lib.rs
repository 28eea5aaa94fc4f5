//! Capstan — control plane for HA cluster configuration.
//!
//! The engine behind the `capstan` binary: a severity-graded validation
//! layer, a concurrent node communicator with partial-failure grading, and
//! the operations that tie validate, execute and commit together.

pub mod comm;
pub mod config;
pub mod ops;
pub mod reports;
pub mod runner;
pub mod validate;
