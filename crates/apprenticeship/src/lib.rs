//! Records backend for student apprenticeships.
//!
//! [`registry`] owns the data model, the record store contract, CRUD, and the one-way
//! confirmation workflow. [`notify`] carries confirmations to students through an outbox
//! drained by a retrying delivery worker.

pub mod config;
pub mod error;
pub mod notify;
pub mod registry;
pub mod telemetry;
