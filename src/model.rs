use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A stored face. Never mutated once it is in the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Face {
    pub id: u64,

    pub text: String,

    /// Owned copy of the tags given at creation
    pub tags: Vec<String>,

    /// Due timestamp, kept in the offset it was submitted with
    pub due: DateTime<FixedOffset>,
}

/// Body of `POST /face/`. All fields are required.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NewFace {
    pub text: String,
    pub tags: Vec<String>,
    pub due: DateTime<FixedOffset>,
}

/// Reply to a successful create.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CreatedId {
    pub id: u64,
}
