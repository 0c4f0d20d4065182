//! Schema bootstrapper
//!
//! One pass, strictly ordered: collections, then the user, then indexes.
//! Only a failure to reach the server before the first step aborts the run;
//! every later failure is recorded against its step and the run carries on.

use tracing::{error, info, warn};

use crate::db::SchemaStore;
use crate::plan::BootstrapPlan;
use crate::report::{Report, StepKind, StepOutcome, StepReport};
use crate::types::{BootstrapError, Result};

/// Bring `plan.database` up to the state the plan describes
///
/// Returns the plan back inside the [`Report`]. Running the same plan twice
/// leaves the database unchanged the second time.
pub async fn bootstrap<S>(store: &S, plan: BootstrapPlan) -> Result<Report>
where
    S: SchemaStore + ?Sized,
{
    plan.validate()?;
    let db = plan.database.as_str();

    info!("Bootstrapping database '{}' ({} steps)", db, plan.step_count());

    // Selecting the database; nothing has been attempted if this fails
    let mut existing = store.collection_names(db).await?;

    let mut steps = Vec::with_capacity(plan.step_count());

    for name in &plan.collections {
        let outcome = if existing.contains(name) {
            StepOutcome::AlreadyExisted
        } else {
            match store.create_collection(db, name).await {
                Ok(()) => {
                    existing.insert(name.clone());
                    StepOutcome::Created
                }
                // Created by someone else since the listing
                Err(BootstrapError::AlreadyExists(_)) => StepOutcome::AlreadyExisted,
                Err(e) => {
                    error!("Failed to create collection '{}': {}", name, e);
                    StepOutcome::Failed(e.reason())
                }
            }
        };
        info!("Collection '{}': {}", name, outcome);
        steps.push(StepReport::new(StepKind::Collection, name.as_str(), outcome));
    }

    if let Some(ref user) = plan.user {
        let outcome = match store.create_user(db, user).await {
            Ok(()) => StepOutcome::Created,
            Err(e @ BootstrapError::AlreadyExists(_)) => {
                info!("User '{}' already exists, leaving it untouched", user.username);
                StepOutcome::Failed(e.reason())
            }
            Err(e) => {
                warn!("Could not create user '{}': {}", user.username, e);
                StepOutcome::Failed(e.reason())
            }
        };
        info!("User '{}': {}", user.username, outcome);
        steps.push(StepReport::new(StepKind::User, user.username.as_str(), outcome));
    }

    for index in &plan.indexes {
        let name = index.index_name();
        let target = format!("{}.{}", index.collection, name);

        let had_index = match store.index_names(db, &index.collection).await {
            Ok(names) => names.contains(&name),
            Err(e) => {
                warn!("Could not list indexes on '{}': {}", index.collection, e);
                false
            }
        };

        let outcome = match store.create_index(db, index).await {
            Ok(()) if had_index => StepOutcome::AlreadyExisted,
            Ok(()) => StepOutcome::Created,
            Err(BootstrapError::AlreadyExists(_)) => StepOutcome::AlreadyExisted,
            Err(e) => {
                warn!("Failed to create index {}: {}", index, e);
                StepOutcome::Failed(e.reason())
            }
        };
        info!("Index {}: {}", index, outcome);
        steps.push(StepReport::new(StepKind::Index, target, outcome));
    }

    let report = Report::from_steps(plan, steps);
    if report.success {
        info!("Bootstrap of '{}' finished: {}", report.plan.database, report.summary());
    } else {
        error!("Bootstrap of '{}' failed: {}", report.plan.database, report.summary());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::plan::{IndexSpec, Preset, RoleGrant, UserSpec};
    use std::collections::HashSet;

    fn outcomes(report: &Report, kind: StepKind) -> Vec<StepOutcome> {
        report.steps_of(kind).map(|s| s.outcome.clone()).collect()
    }

    #[tokio::test]
    async fn test_fresh_database_creates_everything() {
        let store = InMemoryStore::new();
        let report = bootstrap(&store, Preset::ContentModel.plan(None)).await.unwrap();

        assert!(report.success);
        assert_eq!(report.steps.len(), 4);
        assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Created));
        assert_eq!(
            store.snapshot_collections("Donnees").await,
            vec!["Publications", "SearchHistory", "Statistiques", "auteurs"]
        );
    }

    #[tokio::test]
    async fn test_second_run_reports_already_existed() {
        let store = InMemoryStore::new();
        bootstrap(&store, Preset::ContentModel.plan(None)).await.unwrap();
        let before = store.snapshot_collections("Donnees").await;

        let report = bootstrap(&store, Preset::ContentModel.plan(None)).await.unwrap();

        assert!(report.success);
        assert_eq!(report.steps.len(), 4);
        assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::AlreadyExisted));
        assert_eq!(store.snapshot_collections("Donnees").await, before);
    }

    #[tokio::test]
    async fn test_existing_user_does_not_stop_indexes() {
        let store = InMemoryStore::new();
        store
            .seed_user(
                "Donnees",
                UserSpec::new("app_user", "old", vec![RoleGrant::read_write("Donnees")]),
            )
            .await;

        let report = bootstrap(&store, Preset::Recommendations.plan(Some("password")))
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(outcomes(&report, StepKind::Collection), vec![StepOutcome::Created; 3]);
        assert_eq!(
            outcomes(&report, StepKind::User),
            vec![StepOutcome::Failed("already exists".into())]
        );
        assert_eq!(outcomes(&report, StepKind::Index), vec![StepOutcome::Created; 3]);

        let targets: Vec<&str> = report
            .steps_of(StepKind::Index)
            .map(|s| s.target.as_str())
            .collect();
        assert_eq!(
            targets,
            vec!["publications.title_text", "publications.authors_1", "auteurs.name_1"]
        );
        assert_eq!(store.user_count("Donnees").await, 1);
    }

    #[tokio::test]
    async fn test_auth_disabled_user_failure_is_non_fatal() {
        let store = InMemoryStore::new();
        store.set_auth_disabled(true);

        let report = bootstrap(&store, Preset::Recommendations.plan(Some("password")))
            .await
            .unwrap();

        assert!(report.success);
        let user = report.steps_of(StepKind::User).next().unwrap();
        assert!(matches!(user.outcome, StepOutcome::Failed(ref r) if r.contains("not authorized")));
        assert_eq!(report.steps_of(StepKind::Index).count(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_server_aborts_before_any_step() {
        let store = InMemoryStore::new();
        store.set_unreachable(true);

        let err = bootstrap(&store, Preset::Recommendations.plan(Some("password")))
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(store.operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_plan_is_rejected_before_connecting() {
        let store = InMemoryStore::new();
        store.set_unreachable(true);

        let plan = BootstrapPlan::new("Donnees").collection("auteurs").collection("auteurs");
        let err = bootstrap(&store, plan).await.unwrap_err();

        assert!(matches!(err, BootstrapError::Plan(_)));
    }

    #[tokio::test]
    async fn test_collections_run_before_indexes() {
        let store = InMemoryStore::new();
        // Index declared against a collection that appears later in the list
        let plan = BootstrapPlan::new("Donnees")
            .index(IndexSpec::ascending("auteurs", "name").unique())
            .collection("publications")
            .collection("auteurs");

        let report = bootstrap(&store, plan).await.unwrap();

        assert_eq!(
            store.operations().await,
            vec![
                "create_collection:publications",
                "create_collection:auteurs",
                "create_index:auteurs.name_1",
            ]
        );
        assert_eq!(outcomes(&report, StepKind::Collection), vec![StepOutcome::Created; 2]);
        assert_eq!(outcomes(&report, StepKind::Index), vec![StepOutcome::Created]);
    }

    #[tokio::test]
    async fn test_index_on_undeclared_collection() {
        let store = InMemoryStore::new();
        let plan = BootstrapPlan::new("Donnees").index(IndexSpec::text("publications", "title"));

        let report = bootstrap(&store, plan).await.unwrap();

        assert!(report.success);
        assert_eq!(outcomes(&report, StepKind::Index), vec![StepOutcome::Created]);
        assert_eq!(store.snapshot_collections("Donnees").await, vec!["publications"]);
    }

    #[tokio::test]
    async fn test_full_preset_is_idempotent() {
        let store = InMemoryStore::new();
        let plan = Preset::Recommendations.plan(Some("password"));

        bootstrap(&store, plan.clone()).await.unwrap();
        let collections = store.snapshot_collections("Donnees").await;
        let indexes = store.snapshot_indexes("Donnees").await;

        let report = bootstrap(&store, plan).await.unwrap();

        assert!(report.success);
        assert_eq!(outcomes(&report, StepKind::Collection), vec![StepOutcome::AlreadyExisted; 3]);
        assert_eq!(outcomes(&report, StepKind::Index), vec![StepOutcome::AlreadyExisted; 3]);
        assert_eq!(store.snapshot_collections("Donnees").await, collections);
        assert_eq!(store.snapshot_indexes("Donnees").await, indexes);
        assert_eq!(store.user_count("Donnees").await, 1);
    }

    #[tokio::test]
    async fn test_conflicting_index_is_recorded() {
        let store = InMemoryStore::new();
        store
            .create_index("Donnees", &IndexSpec::ascending("auteurs", "name"))
            .await
            .unwrap();

        let plan = BootstrapPlan::new("Donnees")
            .collection("auteurs")
            .index(IndexSpec::ascending("auteurs", "name").unique())
            .index(IndexSpec::ascending("auteurs", "country"));

        let report = bootstrap(&store, plan).await.unwrap();

        assert!(report.success);
        let index_outcomes = outcomes(&report, StepKind::Index);
        assert!(index_outcomes[0].is_failure());
        assert_eq!(index_outcomes[1], StepOutcome::Created);
    }

    struct FailingCollections;

    #[async_trait::async_trait]
    impl SchemaStore for FailingCollections {
        async fn collection_names(&self, _db: &str) -> Result<HashSet<String>> {
            Ok(HashSet::from(["auteurs".to_string()]))
        }

        async fn create_collection(&self, _db: &str, name: &str) -> Result<()> {
            if name == "locked" {
                Err(BootstrapError::Database("not authorized on Donnees".into()))
            } else {
                Err(BootstrapError::AlreadyExists(name.to_string()))
            }
        }

        async fn create_user(&self, _db: &str, _user: &UserSpec) -> Result<()> {
            Ok(())
        }

        async fn user_exists(&self, _db: &str, _username: &str) -> Result<bool> {
            Ok(false)
        }

        async fn index_names(&self, _db: &str, _collection: &str) -> Result<HashSet<String>> {
            Err(BootstrapError::Database("listIndexes failed".into()))
        }

        async fn create_index(&self, _db: &str, _index: &IndexSpec) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_collection_failure_marks_run_failed_but_continues() {
        let plan = BootstrapPlan::new("Donnees")
            .collection("auteurs")
            .collection("locked")
            .collection("raced")
            .index(IndexSpec::ascending("auteurs", "name"));

        let report = bootstrap(&FailingCollections, plan).await.unwrap();

        assert!(!report.success);
        assert_eq!(
            outcomes(&report, StepKind::Collection),
            vec![
                StepOutcome::AlreadyExisted,
                StepOutcome::Failed("not authorized on Donnees".into()),
                StepOutcome::AlreadyExisted,
            ]
        );
        // Listing failed, creation still attempted
        assert_eq!(outcomes(&report, StepKind::Index), vec![StepOutcome::Created]);
    }
}
