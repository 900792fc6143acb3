use crate::cron::{CronError, parse_cron};
use crate::schema::{
    DEFAULT_PRIORITY, DEFAULT_TIMEZONE, Schedule, ScheduleKind, ScheduleRequest,
};
use crate::services::store::ScheduleStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression `{expr}`: {source}")]
    InvalidCronExpression {
        expr: String,
        #[source]
        source: CronError,
    },
    #[error("unknown timezone `{0}`")]
    InvalidTimezone(String),
    #[error("`{expr}` never fires within a year")]
    ComputationBoundsExceeded { expr: String },
    #[error("max_fires must be at least 1, got {0}")]
    InvalidMaxFires(i32),
    #[error("schedule {0} not found")]
    NotFound(Uuid),
    #[error("the digest schedule can only be retimed")]
    DigestLocked,
    #[error("schedule {0} has already run its course")]
    Finished(Uuid),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ScheduleError {
    /// Rejections the user can fix by rephrasing; everything else is ours.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

fn parse_timezone(name: &str) -> Result<chrono_tz::Tz, ScheduleError> {
    name.parse()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

pub fn compute_next_fire(
    cron_expr: &str,
    timezone: &str,
    from: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let tz = parse_timezone(timezone)?;
    let parsed = parse_cron(cron_expr).map_err(|source| ScheduleError::InvalidCronExpression {
        expr: cron_expr.to_string(),
        source,
    })?;

    parsed.next_after(&tz, from).ok_or_else(|| {
        tracing::error!(
            cron_expr,
            timezone,
            %from,
            "schedule: valid cron has no occurrence within the scan bound"
        );
        ScheduleError::ComputationBoundsExceeded {
            expr: cron_expr.to_string(),
        }
    })
}

/// Sole writer of schedule rows. Every operation reads and writes one record.
#[derive(Clone)]
pub struct ScheduleManager {
    store: Arc<dyn ScheduleStore>,
    default_timezone: String,
}

impl ScheduleManager {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self {
            store,
            default_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    pub fn with_default_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.default_timezone = timezone.into();
        self
    }

    pub async fn create(
        &self,
        chat_id: &str,
        request: ScheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        if let Some(max) = request.max_fires.filter(|max| *max < 1) {
            return Err(ScheduleError::InvalidMaxFires(max));
        }

        let timezone = request
            .timezone
            .unwrap_or_else(|| self.default_timezone.clone());
        let next_fire = compute_next_fire(&request.cron_expr, &timezone, now)?;

        let schedule = Schedule {
            id: Uuid::new_v4(),
            kind: ScheduleKind::Recurring,
            chat_id: chat_id.to_string(),
            title: request.title,
            description: request.description,
            category: request.category,
            priority: request
                .priority
                .unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
            tags: request.tags,
            cron_expr: request.cron_expr,
            timezone,
            human_rule: request.human_rule,
            auto_create: request.auto_create.unwrap_or(true),
            notify: request.notify.unwrap_or(true),
            template: request.template,
            active: true,
            next_fire,
            last_fired: None,
            fire_count: 0,
            max_fires: request.max_fires,
            expires_at: request.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.store.save(&schedule).await?;

        tracing::info!(
            schedule_id = %schedule.id,
            chat_id,
            cron_expr = %schedule.cron_expr,
            next_fire = %schedule.next_fire,
            "schedule: created"
        );
        Ok(schedule)
    }

    /// Seeds the chat's digest schedule unless one already exists.
    pub async fn ensure_digest(
        &self,
        chat_id: &str,
        cron_expr: &str,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        if let Some(existing) = self.store.find_digest(chat_id).await? {
            return Ok(existing);
        }

        let next_fire = compute_next_fire(cron_expr, timezone, now)?;
        let digest = Schedule {
            id: Uuid::new_v4(),
            kind: ScheduleKind::Digest,
            chat_id: chat_id.to_string(),
            title: "Daily digest".to_string(),
            description: None,
            category: None,
            priority: DEFAULT_PRIORITY.to_string(),
            tags: Vec::new(),
            cron_expr: cron_expr.to_string(),
            timezone: timezone.to_string(),
            human_rule: "daily task digest".to_string(),
            auto_create: false,
            notify: true,
            template: None,
            active: true,
            next_fire,
            last_fired: None,
            fire_count: 0,
            max_fires: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.save(&digest).await?;

        tracing::info!(schedule_id = %digest.id, chat_id, cron_expr, "schedule: digest seeded");
        Ok(digest)
    }

    pub async fn list_active(&self, chat_id: &str) -> Result<Vec<Schedule>, ScheduleError> {
        Ok(self.store.list_active(chat_id).await?)
    }

    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, ScheduleError> {
        Ok(self.store.list_due(now).await?)
    }

    /// Records one fire and advances the schedule from `now`, not from the old
    /// `next_fire`, so a late sweep never produces a burst of catch-up fires.
    pub async fn mark_fired(
        &self,
        schedule: &Schedule,
        now: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        let mut current = self.load(&schedule.chat_id, schedule.id).await?;
        if !current.active {
            tracing::debug!(schedule_id = %current.id, "schedule: already inactive, not advancing");
            return Ok(current);
        }

        current.fire_count += 1;
        current.last_fired = Some(now);
        current.updated_at = now;

        if current.is_exhausted() || current.is_expired(now) {
            current.active = false;
            self.store.save(&current).await?;
            tracing::info!(
                schedule_id = %current.id,
                fire_count = current.fire_count,
                max_fires = ?current.max_fires,
                expires_at = ?current.expires_at,
                "schedule: finished, deactivated"
            );
            return Ok(current);
        }

        match compute_next_fire(&current.cron_expr, &current.timezone, now) {
            Ok(next) => {
                current.next_fire = next;
                self.store.save(&current).await?;
                Ok(current)
            }
            Err(err) => {
                // the fire itself happened; only the rule has run out of reach
                current.active = false;
                self.store.save(&current).await?;
                tracing::error!(
                    schedule_id = %current.id,
                    cron_expr = %current.cron_expr,
                    error = %err,
                    "schedule: deactivated, next fire cannot be computed"
                );
                Ok(current)
            }
        }
    }

    /// Deactivates a schedule whose deadline has passed without firing it.
    pub async fn expire(
        &self,
        schedule: &Schedule,
        now: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        let mut current = self.load(&schedule.chat_id, schedule.id).await?;
        if current.active {
            current.active = false;
            current.updated_at = now;
            self.store.save(&current).await?;
            tracing::info!(
                schedule_id = %current.id,
                expires_at = ?current.expires_at,
                "schedule: expired, deactivated"
            );
        }
        Ok(current)
    }

    pub async fn pause(
        &self,
        chat_id: &str,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        let mut current = self.load(chat_id, id).await?;
        if current.is_digest() {
            return Err(ScheduleError::DigestLocked);
        }

        current.active = false;
        current.updated_at = now;
        self.store.save(&current).await?;
        tracing::info!(schedule_id = %id, chat_id, "schedule: paused");
        Ok(current)
    }

    /// Reactivates from `now`; occurrences missed while paused are dropped.
    pub async fn resume(
        &self,
        chat_id: &str,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        let mut current = self.load(chat_id, id).await?;
        if current.is_digest() {
            return Err(ScheduleError::DigestLocked);
        }
        if current.is_exhausted() || current.is_expired(now) {
            return Err(ScheduleError::Finished(id));
        }

        current.next_fire = compute_next_fire(&current.cron_expr, &current.timezone, now)?;
        current.active = true;
        current.updated_at = now;
        self.store.save(&current).await?;
        tracing::info!(
            schedule_id = %id,
            chat_id,
            next_fire = %current.next_fire,
            "schedule: resumed"
        );
        Ok(current)
    }

    /// Replaces the rule. A rejected expression leaves the stored rule as it was.
    pub async fn update_cron(
        &self,
        chat_id: &str,
        id: Uuid,
        cron_expr: &str,
        human_rule: &str,
        timezone: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        let mut current = self.load(chat_id, id).await?;
        let timezone = timezone.unwrap_or(&current.timezone).to_string();
        let next_fire = compute_next_fire(cron_expr, &timezone, now)?;

        current.cron_expr = cron_expr.to_string();
        current.human_rule = human_rule.to_string();
        current.timezone = timezone;
        current.next_fire = next_fire;
        current.updated_at = now;
        self.store.save(&current).await?;

        tracing::info!(
            schedule_id = %id,
            chat_id,
            cron_expr,
            next_fire = %next_fire,
            "schedule: rule updated"
        );
        Ok(current)
    }

    pub async fn delete(&self, chat_id: &str, id: Uuid) -> Result<(), ScheduleError> {
        let current = self.load(chat_id, id).await?;
        if current.is_digest() {
            return Err(ScheduleError::DigestLocked);
        }

        if !self.store.delete(chat_id, id).await? {
            return Err(ScheduleError::NotFound(id));
        }
        tracing::info!(schedule_id = %id, chat_id, "schedule: deleted");
        Ok(())
    }

    async fn load(&self, chat_id: &str, id: Uuid) -> Result<Schedule, ScheduleError> {
        self.store
            .get(chat_id, id)
            .await?
            .ok_or(ScheduleError::NotFound(id))
    }
}
