//! Common utilities for device-control
//!
//! This crate provides the ambient pieces shared by the host library and the
//! self-test binary: the common error type and logging setup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{VALID_LOG_LEVELS, is_valid_log_level, setup_logging};
