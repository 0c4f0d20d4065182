//! Database access for the bootstrapper
//!
//! Everything the bootstrapper needs from the server goes through
//! [`SchemaStore`], so runs can be exercised against [`InMemoryStore`]
//! as well as a live MongoDB deployment.

pub mod memory;
pub mod mongo;

use std::collections::HashSet;

use crate::plan::{IndexSpec, UserSpec};
use crate::types::Result;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

/// Schema operations against one server, scoped per call to a database
#[async_trait::async_trait]
pub trait SchemaStore: Send + Sync {
    /// Names of the collections that currently exist
    async fn collection_names(&self, db: &str) -> Result<HashSet<String>>;

    /// Create a collection; `AlreadyExists` if it is already there
    async fn create_collection(&self, db: &str, name: &str) -> Result<()>;

    /// Create a user; `AlreadyExists` if the username is taken
    async fn create_user(&self, db: &str, user: &UserSpec) -> Result<()>;

    async fn user_exists(&self, db: &str, username: &str) -> Result<bool>;

    /// Index names on a collection; empty when the collection is missing
    async fn index_names(&self, db: &str, collection: &str) -> Result<HashSet<String>>;

    /// Create an index, implicitly creating its collection
    ///
    /// Re-creating an identical index succeeds without changes.
    async fn create_index(&self, db: &str, index: &IndexSpec) -> Result<()>;
}
