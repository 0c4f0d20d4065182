//! Index descriptors
//!
//! An index is declared as an ordered list of `(field, kind)` keys plus
//! options. Names follow the server's default naming so an existing index
//! can be recognised before `createIndexes` is sent.

use bson::{Bson, Document};
use mongodb::{options::IndexOptions, IndexModel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::types::BootstrapError;

/// Direction or special kind of a single index key
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Ascending,
    Descending,
    Text,
    Hashed,
    #[serde(rename = "2dsphere")]
    Sphere2d,
}

impl IndexKind {
    /// Value stored in the key document
    pub fn to_bson(self) -> Bson {
        match self {
            Self::Ascending => Bson::Int32(1),
            Self::Descending => Bson::Int32(-1),
            Self::Text => Bson::String("text".to_string()),
            Self::Hashed => Bson::String("hashed".to_string()),
            Self::Sphere2d => Bson::String("2dsphere".to_string()),
        }
    }

    /// Suffix the server uses when it generates an index name
    fn name_suffix(self) -> &'static str {
        match self {
            Self::Ascending => "1",
            Self::Descending => "-1",
            Self::Text => "text",
            Self::Hashed => "hashed",
            Self::Sphere2d => "2dsphere",
        }
    }
}

/// One `(field, kind)` pair of an index key
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub kind: IndexKind,
}

impl IndexKey {
    pub fn new(field: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

/// Index to ensure on a collection
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    /// Target collection (does not have to be in the plan's collection list)
    pub collection: String,

    /// Ordered key specification
    pub keys: Vec<IndexKey>,

    /// Enforce uniqueness
    #[serde(default)]
    pub unique: bool,

    /// Explicit index name; derived from the keys when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IndexSpec {
    pub fn new(collection: impl Into<String>, keys: Vec<IndexKey>) -> Self {
        Self {
            collection: collection.into(),
            keys,
            unique: false,
            name: None,
        }
    }

    /// Single-field ascending index
    pub fn ascending(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(collection, vec![IndexKey::new(field, IndexKind::Ascending)])
    }

    /// Single-field text index
    pub fn text(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(collection, vec![IndexKey::new(field, IndexKind::Text)])
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Effective index name, e.g. `title_text` or `name_1`
    pub fn index_name(&self) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        self.keys
            .iter()
            .map(|k| format!("{}_{}", k.field, k.kind.name_suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Key document in declaration order
    pub fn keys_document(&self) -> Document {
        let mut keys = Document::new();
        for key in &self.keys {
            keys.insert(key.field.clone(), key.kind.to_bson());
        }
        keys
    }

    /// Driver options; the name is always set so it matches `index_name`
    pub fn options(&self) -> IndexOptions {
        let mut options = IndexOptions::builder().name(self.index_name()).build();
        if self.unique {
            options.unique = Some(true);
        }
        options
    }

    pub fn to_model(&self) -> IndexModel {
        IndexModel::builder()
            .keys(self.keys_document())
            .options(self.options())
            .build()
    }

    pub(crate) fn validate(&self) -> Result<(), BootstrapError> {
        if self.collection.is_empty() {
            return Err(BootstrapError::Plan("index has an empty collection name".into()));
        }
        if self.keys.is_empty() {
            return Err(BootstrapError::Plan(format!(
                "index on '{}' declares no keys",
                self.collection
            )));
        }
        let mut seen = HashSet::new();
        for key in &self.keys {
            if key.field.is_empty() {
                return Err(BootstrapError::Plan(format!(
                    "index on '{}' has an empty field name",
                    self.collection
                )));
            }
            if !seen.insert(key.field.as_str()) {
                return Err(BootstrapError::Plan(format!(
                    "index on '{}' repeats field '{}'",
                    self.collection, key.field
                )));
            }
        }
        if matches!(self.name.as_deref(), Some("")) {
            return Err(BootstrapError::Plan(format!(
                "index on '{}' has an empty name",
                self.collection
            )));
        }
        Ok(())
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.collection, self.index_name())?;
        if self.unique {
            write!(f, " (unique)")?;
        }
        Ok(())
    }
}
