//! MongoDB implementation of [`SchemaStore`]

use bson::{doc, Bson, Document};
use mongodb::{
    error::{Error as MongoError, ErrorKind},
    options::ClientOptions,
    Client,
};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use super::SchemaStore;
use crate::plan::{IndexSpec, UserSpec};
use crate::types::{BootstrapError, Result};

/// `NamespaceNotFound`
const NAMESPACE_NOT_FOUND: i32 = 26;

/// `NamespaceExists`, returned by `create` for an existing collection
const NAMESPACE_EXISTS: i32 = 48;

/// `createUser` on an existing user (4.4+)
const USER_ALREADY_EXISTS: i32 = 51003;

/// `createUser` on an existing user (older servers)
const DUPLICATE_KEY: i32 = 11000;

/// Application name reported to the server
const APP_NAME: &str = "mongo-bootstrap";

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Connect and verify the target database answers `ping`
    ///
    /// Any failure here is fatal for the run.
    pub async fn connect(uri: &str, db_name: &str, timeout: Duration) -> Result<Self> {
        // A mongodb+srv:// URI resolves its hosts here, so DNS failures
        // surface as connection errors rather than bad configuration
        let mut options = ClientOptions::parse(uri).await.map_err(classify)?;

        // Fail fast on an unreachable server instead of the driver's 30s default
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout = Some(timeout);
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options)
            .map_err(|e| BootstrapError::Connection(format!("Failed to create MongoDB client: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BootstrapError::Connection(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl SchemaStore for MongoStore {
    async fn collection_names(&self, db: &str) -> Result<HashSet<String>> {
        let names = self.client.database(db).list_collection_names().await?;
        Ok(names.into_iter().collect())
    }

    async fn create_collection(&self, db: &str, name: &str) -> Result<()> {
        self.client.database(db).create_collection(name).await?;
        debug!("createCollection {}.{} ok", db, name);
        Ok(())
    }

    async fn create_user(&self, db: &str, user: &UserSpec) -> Result<()> {
        let roles: Vec<Document> = user
            .roles
            .iter()
            .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.db.as_str() })
            .collect();

        let command = doc! {
            "createUser": user.username.as_str(),
            "pwd": user.password.as_str(),
            "roles": roles,
        };

        match self.client.database(db).run_command(command).await {
            Ok(_) => Ok(()),
            Err(e) if command_code(&e) == Some(DUPLICATE_KEY) => {
                Err(BootstrapError::AlreadyExists(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn user_exists(&self, db: &str, username: &str) -> Result<bool> {
        let reply = self
            .client
            .database(db)
            .run_command(doc! { "usersInfo": username })
            .await?;
        Ok(users_in_reply(&reply) > 0)
    }

    async fn index_names(&self, db: &str, collection: &str) -> Result<HashSet<String>> {
        let coll = self.client.database(db).collection::<Document>(collection);
        match coll.list_index_names().await {
            Ok(names) => Ok(names.into_iter().collect()),
            Err(e) if command_code(&e) == Some(NAMESPACE_NOT_FOUND) => Ok(HashSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_index(&self, db: &str, index: &IndexSpec) -> Result<()> {
        let coll = self.client.database(db).collection::<Document>(&index.collection);
        let result = coll.create_index(index.to_model()).await?;
        debug!("createIndexes {}.{} -> {}", db, index.collection, result.index_name);
        Ok(())
    }
}

/// Server error code, when the error is a command failure
fn command_code(err: &MongoError) -> Option<i32> {
    match &*err.kind {
        ErrorKind::Command(cmd) => Some(cmd.code),
        _ => None,
    }
}

/// Number of entries in a `usersInfo` reply
fn users_in_reply(reply: &Document) -> usize {
    match reply.get("users") {
        Some(Bson::Array(users)) => users.len(),
        _ => 0,
    }
}

/// Map a driver error onto the bootstrapper's taxonomy
pub(crate) fn classify(err: MongoError) -> BootstrapError {
    match &*err.kind {
        ErrorKind::Command(cmd) if cmd.code == NAMESPACE_EXISTS || cmd.code == USER_ALREADY_EXISTS => {
            BootstrapError::AlreadyExists(cmd.message.clone())
        }
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => BootstrapError::Connection(err.to_string()),
        ErrorKind::InvalidArgument { .. } => BootstrapError::Config(err.to_string()),
        _ => BootstrapError::Database(err.to_string()),
    }
}
