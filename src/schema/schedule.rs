use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PRIORITY: &str = "medium";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

#[forge::forge_enum]
pub enum ScheduleKind {
    Recurring,
    Digest,
}

/// A recurring rule plus its firing state.
///
/// While `active`, `next_fire` is the first cron match after the most recent
/// fire (or after creation/resume). Once deactivated it is left stale.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[forge::model]
pub struct Schedule {
    pub id: Uuid,
    pub kind: ScheduleKind,
    pub chat_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: String,
    pub tags: Vec<String>,
    pub cron_expr: String,
    pub timezone: String,
    pub human_rule: String,
    pub auto_create: bool,
    pub notify: bool,
    pub template: Option<String>,
    pub active: bool,
    pub next_fire: DateTime<Utc>,
    pub last_fired: Option<DateTime<Utc>>,
    pub fire_count: i32,
    pub max_fires: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn is_digest(&self) -> bool {
        self.kind == ScheduleKind::Digest
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_fires.is_some_and(|max| self.fire_count >= max)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    /// The pending occurrence falls after the deadline, so it must not fire.
    pub fn misses_deadline(&self) -> bool {
        self.expires_at.is_some_and(|deadline| deadline < self.next_fire)
    }
}

/// Structured schedule intent as produced by the triage model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cron_expr: String,
    #[serde(default)]
    pub timezone: Option<String>,
    pub human_rule: String,
    #[serde(default)]
    pub auto_create: Option<bool>,
    #[serde(default)]
    pub notify: Option<bool>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub max_fires: Option<i32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ScheduleRequest {
    pub fn new(title: impl Into<String>, cron_expr: impl Into<String>, human_rule: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            category: None,
            priority: None,
            tags: Vec::new(),
            cron_expr: cron_expr.into(),
            timezone: None,
            human_rule: human_rule.into(),
            auto_create: None,
            notify: None,
            template: None,
            max_fires: None,
            expires_at: None,
        }
    }
}
