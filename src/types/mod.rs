//! Shared types

mod error;

pub use error::{BootstrapError, Result};
