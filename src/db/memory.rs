//! In-process [`SchemaStore`]
//!
//! Mirrors the server behaviour the bootstrapper relies on: collections get
//! an `_id_` index on creation, `createIndexes` creates the collection,
//! identical index re-creation is a no-op and conflicting options fail.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::SchemaStore;
use crate::plan::{IndexSpec, UserSpec};
use crate::types::{BootstrapError, Result};

/// Name of the index every collection is born with
const ID_INDEX: &str = "_id_";

#[derive(Default)]
struct DatabaseState {
    /// collection -> index name -> definition (`None` for `_id_`)
    collections: HashMap<String, HashMap<String, Option<IndexSpec>>>,
    users: HashMap<String, UserSpec>,
}

impl DatabaseState {
    fn ensure_collection(&mut self, name: &str) -> &mut HashMap<String, Option<IndexSpec>> {
        self.collections.entry(name.to_string()).or_insert_with(|| {
            let mut indexes = HashMap::new();
            indexes.insert(ID_INDEX.to_string(), None);
            indexes
        })
    }
}

/// Simple in-memory schema store
pub struct InMemoryStore {
    databases: Arc<RwLock<HashMap<String, DatabaseState>>>,
    operations: Arc<RwLock<Vec<String>>>,
    unreachable: AtomicBool,
    auth_disabled: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            databases: Arc::new(RwLock::new(HashMap::new())),
            operations: Arc::new(RwLock::new(Vec::new())),
            unreachable: AtomicBool::new(false),
            auth_disabled: AtomicBool::new(false),
        }
    }

    /// Every call fails as if the server could not be selected
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// `createUser` fails the way a server without access control does
    pub fn set_auth_disabled(&self, disabled: bool) {
        self.auth_disabled.store(disabled, Ordering::SeqCst);
    }

    /// Pre-populate a collection
    pub async fn seed_collection(&self, db: &str, name: &str) {
        let mut dbs = self.databases.write().await;
        dbs.entry(db.to_string()).or_default().ensure_collection(name);
    }

    /// Pre-populate a user
    pub async fn seed_user(&self, db: &str, user: UserSpec) {
        let mut dbs = self.databases.write().await;
        dbs.entry(db.to_string())
            .or_default()
            .users
            .insert(user.username.clone(), user);
    }

    /// Mutating calls in the order they were made, e.g. `create_collection:auteurs`
    pub async fn operations(&self) -> Vec<String> {
        self.operations.read().await.clone()
    }

    /// Sorted collection names of a database
    pub async fn snapshot_collections(&self, db: &str) -> Vec<String> {
        let dbs = self.databases.read().await;
        let mut names: Vec<String> = dbs
            .get(db)
            .map(|state| state.collections.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Sorted `collection.index` names of a database
    pub async fn snapshot_indexes(&self, db: &str) -> Vec<String> {
        let dbs = self.databases.read().await;
        let mut names: Vec<String> = dbs
            .get(db)
            .map(|state| {
                state
                    .collections
                    .iter()
                    .flat_map(|(coll, indexes)| indexes.keys().map(move |i| format!("{}.{}", coll, i)))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    pub async fn user_count(&self, db: &str) -> usize {
        let dbs = self.databases.read().await;
        dbs.get(db).map(|state| state.users.len()).unwrap_or(0)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BootstrapError::Connection(
                "Server selection timeout: No available servers".into(),
            ));
        }
        Ok(())
    }

    async fn record(&self, op: String) {
        self.operations.write().await.push(op);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SchemaStore for InMemoryStore {
    async fn collection_names(&self, db: &str) -> Result<HashSet<String>> {
        self.check_reachable()?;
        let dbs = self.databases.read().await;
        Ok(dbs
            .get(db)
            .map(|state| state.collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_collection(&self, db: &str, name: &str) -> Result<()> {
        self.check_reachable()?;
        self.record(format!("create_collection:{}", name)).await;

        let mut dbs = self.databases.write().await;
        let state = dbs.entry(db.to_string()).or_default();
        if state.collections.contains_key(name) {
            return Err(BootstrapError::AlreadyExists(format!(
                "Collection {}.{} already exists.",
                db, name
            )));
        }
        state.ensure_collection(name);
        Ok(())
    }

    async fn create_user(&self, db: &str, user: &UserSpec) -> Result<()> {
        self.check_reachable()?;
        self.record(format!("create_user:{}", user.username)).await;

        if self.auth_disabled.load(Ordering::SeqCst) {
            return Err(BootstrapError::Database(
                "not authorized on admin to execute command { createUser }".into(),
            ));
        }

        let mut dbs = self.databases.write().await;
        let state = dbs.entry(db.to_string()).or_default();
        if state.users.contains_key(&user.username) {
            return Err(BootstrapError::AlreadyExists(format!(
                "User \"{}@{}\" already exists",
                user.username, db
            )));
        }
        state.users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn user_exists(&self, db: &str, username: &str) -> Result<bool> {
        self.check_reachable()?;
        let dbs = self.databases.read().await;
        Ok(dbs
            .get(db)
            .map(|state| state.users.contains_key(username))
            .unwrap_or(false))
    }

    async fn index_names(&self, db: &str, collection: &str) -> Result<HashSet<String>> {
        self.check_reachable()?;
        let dbs = self.databases.read().await;
        Ok(dbs
            .get(db)
            .and_then(|state| state.collections.get(collection))
            .map(|indexes| indexes.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_index(&self, db: &str, index: &IndexSpec) -> Result<()> {
        self.check_reachable()?;
        let name = index.index_name();
        self.record(format!("create_index:{}.{}", index.collection, name)).await;

        let mut dbs = self.databases.write().await;
        let indexes = dbs
            .entry(db.to_string())
            .or_default()
            .ensure_collection(&index.collection);

        if let Some(existing) = indexes.get(&name) {
            return match existing {
                Some(spec) if spec.keys == index.keys && spec.unique == index.unique => Ok(()),
                _ => Err(BootstrapError::Database(format!(
                    "Index with name: {} already exists with different options",
                    name
                ))),
            };
        }
        indexes.insert(name, Some(index.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RoleGrant;

    #[tokio::test]
    async fn test_create_collection_twice() {
        let store = InMemoryStore::new();
        store.create_collection("db", "auteurs").await.unwrap();
        let err = store.create_collection("db", "auteurs").await.unwrap_err();
        assert!(matches!(err, BootstrapError::AlreadyExists(_)));
        assert_eq!(store.snapshot_collections("db").await, vec!["auteurs"]);
    }

    #[tokio::test]
    async fn test_collections_start_with_id_index() {
        let store = InMemoryStore::new();
        store.create_collection("db", "auteurs").await.unwrap();
        let names = store.index_names("db", "auteurs").await.unwrap();
        assert!(names.contains("_id_"));
        assert!(store.index_names("db", "missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_creates_collection_and_is_idempotent() {
        let store = InMemoryStore::new();
        let spec = IndexSpec::ascending("auteurs", "name").unique();

        store.create_index("db", &spec).await.unwrap();
        store.create_index("db", &spec).await.unwrap();

        assert_eq!(store.snapshot_collections("db").await, vec!["auteurs"]);
        assert_eq!(
            store.snapshot_indexes("db").await,
            vec!["auteurs._id_", "auteurs.name_1"]
        );
    }

    #[tokio::test]
    async fn test_index_conflict() {
        let store = InMemoryStore::new();
        store
            .create_index("db", &IndexSpec::ascending("auteurs", "name"))
            .await
            .unwrap();
        let err = store
            .create_index("db", &IndexSpec::ascending("auteurs", "name").unique())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Database(_)));
    }

    #[tokio::test]
    async fn test_users() {
        let store = InMemoryStore::new();
        let user = UserSpec::new("app_user", "pw", vec![RoleGrant::read_write("db")]);

        assert!(!store.user_exists("db", "app_user").await.unwrap());
        store.create_user("db", &user).await.unwrap();
        assert!(store.user_exists("db", "app_user").await.unwrap());

        let err = store.create_user("db", &user).await.unwrap_err();
        assert_eq!(err.reason(), "already exists");
        assert_eq!(store.user_count("db").await, 1);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let store = InMemoryStore::new();
        store.set_unreachable(true);
        let err = store.collection_names("db").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(store.operations().await.is_empty());
    }
}
