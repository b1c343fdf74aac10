use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form review document. Whatever the client sent is kept in `body`
/// and flattened back out on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
