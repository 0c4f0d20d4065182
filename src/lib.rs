//! mongo-bootstrap - idempotent MongoDB schema bootstrapper
//!
//! Brings one database to a declared state in a single ordered pass:
//!
//! - **Collections**: created when absent, in declaration order
//! - **User**: optionally created with its role grants; failure never aborts
//! - **Indexes**: created after every collection step, identical ones are no-ops
//!
//! Only an unreachable server aborts a run. Everything else ends up as a
//! line in the [`Report`].

pub mod bootstrap;
pub mod check;
pub mod config;
pub mod db;
pub mod logging;
pub mod plan;
pub mod report;
pub mod types;

pub use bootstrap::bootstrap;
pub use check::{check, CheckReport, CheckState};
pub use config::Args;
pub use plan::{BootstrapPlan, IndexSpec, Preset, UserSpec};
pub use report::{Report, StepKind, StepOutcome};
pub use types::{BootstrapError, Result};
