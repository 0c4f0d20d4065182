//! Read-only verification of a plan against a live database
//!
//! Answers "would a bootstrap run change anything?" without creating
//! collections, users or indexes. Only the initial collection listing can
//! fail the check; an entity whose existence cannot be queried is reported
//! as `unknown`.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::db::SchemaStore;
use crate::plan::BootstrapPlan;
use crate::report::StepKind;
use crate::types::Result;

/// Whether one planned entity exists
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CheckState {
    Present,
    Missing,
    /// The existence query itself failed
    Unknown(String),
}

impl CheckState {
    fn from_query(query: Result<bool>, kind: StepKind, target: &str) -> Self {
        match query {
            Ok(true) => Self::Present,
            Ok(false) => Self::Missing,
            Err(e) => {
                warn!("Could not check {} '{}': {}", kind, target, e);
                Self::Unknown(e.reason())
            }
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Missing => write!(f, "missing"),
            Self::Unknown(reason) => write!(f, "unknown: {}", reason),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CheckEntry {
    pub kind: StepKind,
    pub target: String,
    pub state: CheckState,
}

impl fmt::Display for CheckEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {:<32} {}", self.kind, self.target, self.state)
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct CheckReport {
    pub database: String,
    pub entries: Vec<CheckEntry>,
}

impl CheckReport {
    /// True when every entity was confirmed present
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.state == CheckState::Present)
    }

    pub fn missing(&self) -> impl Iterator<Item = &CheckEntry> {
        self.entries.iter().filter(|e| e.state == CheckState::Missing)
    }

    pub fn unknown(&self) -> impl Iterator<Item = &CheckEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, CheckState::Unknown(_)))
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "database {}", self.database)?;
        for entry in &self.entries {
            writeln!(f, "  {}", entry)?;
        }
        let missing = self.missing().count();
        let unknown = self.unknown().count();
        match (missing, unknown) {
            (0, 0) => write!(f, "complete"),
            (_, 0) => write!(f, "{} missing", missing),
            _ => write!(f, "{} missing, {} unknown", missing, unknown),
        }
    }
}

/// Report which entities of `plan` already exist
pub async fn check<S>(store: &S, plan: &BootstrapPlan) -> Result<CheckReport>
where
    S: SchemaStore + ?Sized,
{
    plan.validate()?;
    let db = plan.database.as_str();

    let collections = store.collection_names(db).await?;
    let mut entries = Vec::with_capacity(plan.step_count());

    for name in &plan.collections {
        let state = if collections.contains(name) {
            CheckState::Present
        } else {
            CheckState::Missing
        };
        entries.push(CheckEntry {
            kind: StepKind::Collection,
            target: name.clone(),
            state,
        });
    }

    if let Some(ref user) = plan.user {
        let query = store.user_exists(db, &user.username).await;
        entries.push(CheckEntry {
            kind: StepKind::User,
            target: user.username.clone(),
            state: CheckState::from_query(query, StepKind::User, &user.username),
        });
    }

    for index in &plan.indexes {
        let name = index.index_name();
        let target = format!("{}.{}", index.collection, name);
        let query = store
            .index_names(db, &index.collection)
            .await
            .map(|names| names.contains(&name));
        let state = CheckState::from_query(query, StepKind::Index, &target);
        entries.push(CheckEntry {
            kind: StepKind::Index,
            target,
            state,
        });
    }

    let report = CheckReport {
        database: db.to_string(),
        entries,
    };

    for entry in report.missing() {
        warn!("Missing {} '{}'", entry.kind, entry.target);
    }
    info!(
        "Checked {} entities in '{}': {}",
        report.entries.len(),
        report.database,
        if report.is_complete() { "complete" } else { "incomplete" }
    );

    Ok(report)
}
