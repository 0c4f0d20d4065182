//! Configuration for mongo-bootstrap
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::plan::{BootstrapPlan, Preset};
use crate::types::Result;

/// Used when neither MONGODB_URI nor MONGO_URI is set
const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";

/// How the final report is written to stdout
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// How log lines are formatted
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// mongo-bootstrap - ensure collections, users and indexes exist
#[derive(Parser, Debug, Clone)]
#[command(name = "mongo-bootstrap")]
#[command(about = "Idempotently create MongoDB collections, an application user and indexes")]
pub struct Args {
    /// MongoDB connection URI [default: mongodb://localhost:27017]
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// Older deployments export MONGO_URI; MONGODB_URI wins when both are set
    #[arg(long, env = "MONGO_URI", hide = true)]
    pub mongo_uri: Option<String>,

    /// Target database (overrides the one named by the plan)
    #[arg(long, env = "MONGODB_DB")]
    pub mongodb_db: Option<String>,

    /// Built-in plan to run
    #[arg(long, env = "BOOTSTRAP_PRESET", value_enum, default_value = "recommendations")]
    pub preset: Preset,

    /// JSON plan file; takes precedence over --preset
    #[arg(long, env = "BOOTSTRAP_PLAN")]
    pub plan_file: Option<PathBuf>,

    /// Password for the preset's application user
    /// Without it the user step is skipped
    #[arg(long, env = "APP_USER_PASSWORD", hide_env_values = true)]
    pub app_user_password: Option<String>,

    /// Never create the user, even if the plan declares one
    #[arg(long, env = "SKIP_USER", default_value = "false")]
    pub skip_user: bool,

    /// Only report what is missing; create nothing
    #[arg(long, env = "CHECK_ONLY", default_value = "false")]
    pub check: bool,

    /// Report format on stdout
    #[arg(long, env = "OUTPUT", value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log line format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Server selection and connect timeout in milliseconds
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value = "3000")]
    pub connect_timeout_ms: u64,
}

impl Args {
    /// The connection URI this run uses
    pub fn uri(&self) -> &str {
        self.mongodb_uri
            .as_deref()
            .or(self.mongo_uri.as_deref())
            .unwrap_or(DEFAULT_MONGODB_URI)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// URI safe to log: any password is replaced with `***`
    pub fn redacted_uri(&self) -> String {
        redact_uri(self.uri())
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        let uri = self.uri();
        if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
            return Err("MONGODB_URI must start with mongodb:// or mongodb+srv://".to_string());
        }

        if self.connect_timeout_ms == 0 {
            return Err("CONNECT_TIMEOUT_MS must be greater than zero".to_string());
        }

        if matches!(self.mongodb_db.as_deref(), Some("")) {
            return Err("MONGODB_DB must not be empty when set".to_string());
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.log_level.as_str()) {
            return Err(format!("Unknown LOG_LEVEL '{}'", self.log_level));
        }

        Ok(())
    }

    /// Build the plan this run will execute
    pub fn resolve_plan(&self) -> Result<BootstrapPlan> {
        let mut plan = match self.plan_file {
            Some(ref path) => BootstrapPlan::from_json_file(path)?,
            None => {
                if self.preset.wants_user() && self.app_user_password.is_none() && !self.skip_user {
                    warn!("APP_USER_PASSWORD not set, the user step will be skipped");
                }
                self.preset.plan(self.app_user_password.as_deref())
            }
        };

        if let Some(ref db) = self.mongodb_db {
            plan = plan.with_database(db.as_str());
        }

        if self.skip_user {
            plan = plan.without_user();
        }

        plan.validate()?;
        Ok(plan)
    }
}

fn redact_uri(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://") else {
        return uri.to_string();
    };
    let rest = &uri[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let Some(at) = rest[..authority_end].rfind('@') else {
        return uri.to_string();
    };
    let userinfo = &rest[..at];
    match userinfo.find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &uri[..scheme_end + 3],
            &userinfo[..colon],
            &rest[at..]
        ),
        None => uri.to_string(),
    }
}
