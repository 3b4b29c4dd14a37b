//! Paperflow: manuscript submission, peer review and editorial decisions for
//! academic conferences.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod notify;
pub mod routes;
pub mod state;
pub mod storage;
pub mod workflow;

pub use error::{ErrorKind, Result, WorkflowError};
pub use workflow::Workflow;
