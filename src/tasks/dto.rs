use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::Category;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
}

/// Absent or empty fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletedResponse {
    pub deleted: bool,
}
