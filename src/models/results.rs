//! Write acknowledgements returned by every mutating endpoint.
//!
//! The web front-end inspects `insertedId`, `modifiedCount` and
//! `deletedCount` to decide what to show, so the shapes are kept stable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

impl InsertResult {
    pub fn new(inserted_id: Uuid) -> Self {
        Self { acknowledged: true, inserted_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateResult {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self { acknowledged: true, matched_count, modified_count }
    }

    pub fn unmatched() -> Self {
        Self::new(0, 0)
    }

    pub fn modified(&self) -> bool {
        self.modified_count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self { acknowledged: true, deleted_count }
    }
}
