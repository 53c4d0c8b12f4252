use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Note,
    Event,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Note => "note",
            Category::Event => "event",
        }
    }

    /// Exact, case-sensitive match against the stored spelling.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "note" => Some(Category::Note),
            "event" => Some(Category::Event),
            _ => None,
        }
    }
}

/// Task as returned to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    pub user_id: Uuid,
}

/// Raw `tasks` row; the category column is plain text.
#[derive(Debug, FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub start_date: OffsetDateTime,
    pub user_id: Uuid,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(r: TaskRow) -> Result<Self, Self::Error> {
        let category = Category::parse(&r.category).ok_or_else(|| {
            StoreError::CorruptRow(format!("task {} has category {:?}", r.id, r.category))
        })?;
        Ok(Self {
            id: r.id,
            title: r.title,
            description: r.description,
            category,
            start_date: r.start_date,
            user_id: r.user_id,
        })
    }
}

/// Insert payload. The owner is passed separately and never comes from a client body.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub start_date: OffsetDateTime,
}

/// Partial update; `None` and empty strings keep the stored value.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub start_date: Option<OffsetDateTime>,
}

impl TaskChanges {
    pub fn apply(self, mut task: Task) -> Task {
        if let Some(title) = self.title.filter(|t| !t.is_empty()) {
            task.title = title;
        }
        if let Some(description) = self.description.filter(|d| !d.is_empty()) {
            task.description = description;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(start_date) = self.start_date {
            task.start_date = start_date;
        }
        task
    }
}
