// docbridge-core/src/identity.rs
// Identity field substitution: "by id" lookups go through an
// application-chosen field instead of the native `_id`.
//
// Index the configured field server-side (see
// `DocumentStoreClient::create_id_index`), otherwise every lookup is a
// collection scan.

use std::fmt;

use mongodb::bson::{oid::ObjectId, Bson, Document};

use crate::config::DEFAULT_ID_FIELD;
use crate::error::{DocBridgeError, Result};

/// Native MongoDB primary key
pub const NATIVE_ID_FIELD: &str = "_id";

/// Value stored in the identity field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Int(i64),
    Str(String),
    ObjectId(ObjectId),
}

impl Identifier {
    pub fn to_bson(&self) -> Bson {
        match self {
            Identifier::Int(i) => Bson::Int64(*i),
            Identifier::Str(s) => Bson::String(s.clone()),
            Identifier::ObjectId(oid) => Bson::ObjectId(*oid),
        }
    }

    /// Empty or whitespace-only string ids are rejected before any I/O.
    pub fn validate(&self) -> Result<()> {
        match self {
            Identifier::Str(s) if s.trim().is_empty() => {
                Err(DocBridgeError::invalid("id must not be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Convert a stored BSON value back into an identifier.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::Int32(i) => Some(Identifier::Int(i64::from(*i))),
            Bson::Int64(i) => Some(Identifier::Int(*i)),
            Bson::String(s) => Some(Identifier::Str(s.clone())),
            Bson::ObjectId(oid) => Some(Identifier::ObjectId(*oid)),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(i) => write!(f, "{}", i),
            Identifier::Str(s) => f.write_str(s),
            Identifier::ObjectId(oid) => write!(f, "{}", oid.to_hex()),
        }
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::Str(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::Str(s)
    }
}

impl From<&String> for Identifier {
    fn from(s: &String) -> Self {
        Identifier::Str(s.clone())
    }
}

impl From<i64> for Identifier {
    fn from(i: i64) -> Self {
        Identifier::Int(i)
    }
}

impl From<i32> for Identifier {
    fn from(i: i32) -> Self {
        Identifier::Int(i64::from(i))
    }
}

impl From<u32> for Identifier {
    fn from(i: u32) -> Self {
        Identifier::Int(i64::from(i))
    }
}

impl From<ObjectId> for Identifier {
    fn from(oid: ObjectId) -> Self {
        Identifier::ObjectId(oid)
    }
}

impl From<Identifier> for Bson {
    fn from(id: Identifier) -> Self {
        id.to_bson()
    }
}

/// Name of the field that identifies documents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdField(String);

impl IdField {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DocBridgeError::invalid("id field must not be empty"));
        }
        if name.starts_with('$') {
            return Err(DocBridgeError::invalid(format!(
                "id field '{}' must not start with '$'",
                name
            )));
        }
        Ok(IdField(name))
    }

    /// The store's own primary key, `_id`
    pub fn native() -> Self {
        IdField(NATIVE_ID_FIELD.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_ID_FIELD
    }

    /// `{ <field>: <id> }`
    pub fn filter(&self, id: &Identifier) -> Document {
        let mut filter = Document::new();
        filter.insert(self.0.clone(), id.to_bson());
        filter
    }

    /// `{ <field>: { "$in": [ids...] } }`
    pub fn filter_any<'a, I>(&self, ids: I) -> Document
    where
        I: IntoIterator<Item = &'a Identifier>,
    {
        let values: Vec<Bson> = ids.into_iter().map(Identifier::to_bson).collect();
        let mut condition = Document::new();
        condition.insert("$in", Bson::Array(values));

        let mut filter = Document::new();
        filter.insert(self.0.clone(), condition);
        filter
    }

    /// Identity value of `doc`, if present
    pub fn extract<'d>(&self, doc: &'d Document) -> Option<&'d Bson> {
        doc.get(&self.0)
    }
}

impl Default for IdField {
    fn default() -> Self {
        IdField(DEFAULT_ID_FIELD.to_string())
    }
}

impl fmt::Display for IdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
