//! Run reports
//!
//! One [`StepReport`] per attempted step, in execution order, plus the
//! overall verdict. Reports render as one line per step for the terminal and
//! serialize to JSON for tooling.

use serde::Serialize;
use std::fmt;

use crate::plan::BootstrapPlan;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Collection,
    User,
    Index,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Collection => "collection",
            Self::User => "user",
            Self::Index => "index",
        })
    }
}

/// What happened to a single step
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Created,
    AlreadyExisted,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AlreadyExisted => write!(f, "already_existed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub kind: StepKind,
    pub target: String,
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn new(kind: StepKind, target: impl Into<String>, outcome: StepOutcome) -> Self {
        Self {
            kind,
            target: target.into(),
            outcome,
        }
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {:<32} {}", self.kind, self.target, self.outcome)
    }
}

/// Result of one bootstrap run, carrying the plan it executed
#[derive(Serialize, Clone, Debug)]
pub struct Report {
    pub plan: BootstrapPlan,
    pub steps: Vec<StepReport>,
    /// False only when a collection step failed
    pub success: bool,
}

impl Report {
    /// Assemble a report; only collection failures count against success
    pub(crate) fn from_steps(plan: BootstrapPlan, steps: Vec<StepReport>) -> Self {
        let success = !steps
            .iter()
            .any(|s| s.kind == StepKind::Collection && s.outcome.is_failure());
        Self {
            plan,
            steps,
            success,
        }
    }

    /// Steps of one kind, in execution order
    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(move |s| s.kind == kind)
    }

    pub fn count(&self, outcome: &StepOutcome) -> usize {
        self.steps.iter().filter(|s| &s.outcome == outcome).count()
    }

    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_failure()).count()
    }

    /// One-line summary, e.g. `3 created, 1 already existed, 0 failed`
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} already existed, {} failed",
            self.count(&StepOutcome::Created),
            self.count(&StepOutcome::AlreadyExisted),
            self.failures()
        )
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "database {}", self.plan.database)?;
        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }
        write!(
            f,
            "{} ({})",
            if self.success { "success" } else { "FAILED" },
            self.summary()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(steps: Vec<StepReport>) -> Report {
        Report::from_steps(BootstrapPlan::new("Donnees"), steps)
    }

    #[test]
    fn test_user_and_index_failures_keep_success() {
        let report = report(vec![
            StepReport::new(StepKind::Collection, "auteurs", StepOutcome::Created),
            StepReport::new(StepKind::User, "app_user", StepOutcome::Failed("already exists".into())),
            StepReport::new(StepKind::Index, "auteurs.name_1", StepOutcome::Failed("conflict".into())),
        ]);
        assert!(report.success);
        assert_eq!(report.failures(), 2);
    }

    #[test]
    fn test_collection_failure_flips_success() {
        let report = report(vec![
            StepReport::new(StepKind::Collection, "auteurs", StepOutcome::Failed("not authorized".into())),
            StepReport::new(StepKind::Collection, "Publications", StepOutcome::Created),
        ]);
        assert!(!report.success);
    }

    #[test]
    fn test_empty_report_succeeds() {
        let report = report(vec![]);
        assert!(report.success);
        assert_eq!(report.summary(), "0 created, 0 already existed, 0 failed");
    }

    #[test]
    fn test_rendering() {
        let report = report(vec![
            StepReport::new(StepKind::Collection, "auteurs", StepOutcome::AlreadyExisted),
            StepReport::new(StepKind::User, "app_user", StepOutcome::Failed("already exists".into())),
        ]);

        let text = report.to_string();
        assert!(text.starts_with("database Donnees"));
        assert!(text.contains("already_existed"));
        assert!(text.contains("failed: already exists"));
        assert!(text.ends_with("success (0 created, 1 already existed, 1 failed)"));
    }

    #[test]
    fn test_json_shape() {
        let report = report(vec![
            StepReport::new(StepKind::Index, "publications.title_text", StepOutcome::Created),
            StepReport::new(StepKind::User, "app_user", StepOutcome::Failed("already exists".into())),
        ]);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["plan"]["database"], "Donnees");
        assert_eq!(value["steps"][0]["kind"], "index");
        assert_eq!(value["steps"][0]["outcome"]["status"], "created");
        assert_eq!(value["steps"][1]["outcome"]["reason"], "already exists");
    }
}
