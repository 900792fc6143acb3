use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A task row handed to the task board when a schedule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub chat_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: String,
    pub tags: Vec<String>,
    pub schedule_id: Option<Uuid>,
}
