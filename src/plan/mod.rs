//! Bootstrap plan
//!
//! A plan is the whole static configuration for one run: the target
//! database, the collections that must exist, an optional user and the
//! indexes to ensure. It is passed by value into the bootstrapper and comes
//! back attached to the report.

mod index;
pub mod presets;

pub use index::{IndexKey, IndexKind, IndexSpec};
pub use presets::Preset;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::types::{BootstrapError, Result};

/// Characters the server refuses in database names
const FORBIDDEN_DB_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$', '\0'];

/// Maximum database name length in bytes
const MAX_DB_NAME_LEN: usize = 63;

/// A `(role, database)` authorization tuple
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }

    pub fn read_write(db: impl Into<String>) -> Self {
        Self::new("readWrite", db)
    }
}

/// User to create in the target database
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub username: String,

    /// Never written back out
    #[serde(skip_serializing, default)]
    pub password: String,

    pub roles: Vec<RoleGrant>,
}

impl UserSpec {
    pub fn new(username: impl Into<String>, password: impl Into<String>, roles: Vec<RoleGrant>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            roles,
        }
    }
}

impl fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSpec")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Everything one bootstrap run should ensure
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BootstrapPlan {
    /// Target database
    pub database: String,

    /// Collections in creation order
    #[serde(default)]
    pub collections: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSpec>,

    /// Indexes in creation order
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl BootstrapPlan {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: Vec::new(),
            user: None,
            indexes: Vec::new(),
        }
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }

    pub fn user(mut self, user: UserSpec) -> Self {
        self.user = Some(user);
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Drop the user step, keeping everything else
    pub fn without_user(mut self) -> Self {
        self.user = None;
        self
    }

    /// Retarget the plan at another database
    ///
    /// Role grants that pointed at the old database follow it.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        let database = database.into();
        if let Some(ref mut user) = self.user {
            for grant in &mut user.roles {
                if grant.db == self.database {
                    grant.db = database.clone();
                }
            }
        }
        self.database = database;
        self
    }

    /// Parse a plan from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let plan: Self = serde_json::from_str(json)?;
        Ok(plan)
    }

    /// Read a plan from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            BootstrapError::Io(format!("cannot read plan file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Check the plan before anything is sent to the server
    pub fn validate(&self) -> Result<()> {
        validate_database_name(&self.database)?;

        let mut seen = HashSet::new();
        for name in &self.collections {
            validate_collection_name(name)?;
            if !seen.insert(name.as_str()) {
                return Err(BootstrapError::Plan(format!(
                    "collection '{}' is listed more than once",
                    name
                )));
            }
        }

        if let Some(ref user) = self.user {
            if user.username.is_empty() {
                return Err(BootstrapError::Plan("user has an empty username".into()));
            }
            if user.password.is_empty() {
                return Err(BootstrapError::Plan(format!(
                    "user '{}' has no password",
                    user.username
                )));
            }
            if user.roles.is_empty() {
                return Err(BootstrapError::Plan(format!(
                    "user '{}' needs at least one role grant",
                    user.username
                )));
            }
            for grant in &user.roles {
                if grant.role.is_empty() {
                    return Err(BootstrapError::Plan(format!(
                        "user '{}' has a grant with an empty role",
                        user.username
                    )));
                }
                validate_database_name(&grant.db)?;
            }
        }

        for index in &self.indexes {
            validate_collection_name(&index.collection)?;
            index.validate()?;
        }

        Ok(())
    }

    /// Total number of steps a run will record
    pub fn step_count(&self) -> usize {
        self.collections.len() + usize::from(self.user.is_some()) + self.indexes.len()
    }
}

fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BootstrapError::Plan("database name is empty".into()));
    }
    if name.len() > MAX_DB_NAME_LEN {
        return Err(BootstrapError::Plan(format!(
            "database name '{}' is longer than {} bytes",
            name, MAX_DB_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_DB_CHARS.contains(c)) {
        return Err(BootstrapError::Plan(format!(
            "database name '{}' contains forbidden character {:?}",
            name, c
        )));
    }
    Ok(())
}

fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BootstrapError::Plan("collection name is empty".into()));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(BootstrapError::Plan(format!(
            "collection name '{}' contains '$' or NUL",
            name
        )));
    }
    if name.starts_with("system.") {
        return Err(BootstrapError::Plan(format!(
            "collection name '{}' uses the reserved 'system.' prefix",
            name
        )));
    }
    Ok(())
}
