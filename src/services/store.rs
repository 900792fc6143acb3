use crate::schema::Schedule;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Row storage for schedules. Every write is a single-record upsert.
#[async_trait::async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn get(&self, chat_id: &str, id: Uuid) -> anyhow::Result<Option<Schedule>>;
    async fn find_digest(&self, chat_id: &str) -> anyhow::Result<Option<Schedule>>;
    async fn list_active(&self, chat_id: &str) -> anyhow::Result<Vec<Schedule>>;
    /// Active schedules with `next_fire <= now`, earliest first.
    async fn list_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Schedule>>;
    async fn save(&self, schedule: &Schedule) -> anyhow::Result<()>;
    async fn delete(&self, chat_id: &str, id: Uuid) -> anyhow::Result<bool>;
}

pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn get(&self, chat_id: &str, id: Uuid) -> anyhow::Result<Option<Schedule>> {
        let row = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, kind, chat_id, title, description, category, priority, tags,
                   cron_expr, timezone, human_rule, auto_create, notify, template,
                   active, next_fire, last_fired, fire_count, max_fires, expires_at,
                   created_at, updated_at
            FROM schedules
            WHERE id = $1 AND chat_id = $2
            "#,
        )
        .bind(id)
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_digest(&self, chat_id: &str) -> anyhow::Result<Option<Schedule>> {
        let row = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, kind, chat_id, title, description, category, priority, tags,
                   cron_expr, timezone, human_rule, auto_create, notify, template,
                   active, next_fire, last_fired, fire_count, max_fires, expires_at,
                   created_at, updated_at
            FROM schedules
            WHERE chat_id = $1 AND kind = 'digest'
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_active(&self, chat_id: &str) -> anyhow::Result<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, kind, chat_id, title, description, category, priority, tags,
                   cron_expr, timezone, human_rule, auto_create, notify, template,
                   active, next_fire, last_fired, fire_count, max_fires, expires_at,
                   created_at, updated_at
            FROM schedules
            WHERE chat_id = $1 AND active = true
            ORDER BY next_fire, id
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, kind, chat_id, title, description, category, priority, tags,
                   cron_expr, timezone, human_rule, auto_create, notify, template,
                   active, next_fire, last_fired, fire_count, max_fires, expires_at,
                   created_at, updated_at
            FROM schedules
            WHERE active = true AND next_fire <= $1
            ORDER BY next_fire, id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn save(&self, schedule: &Schedule) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedules (
                id, kind, chat_id, title, description, category, priority, tags,
                cron_expr, timezone, human_rule, auto_create, notify, template,
                active, next_fire, last_fired, fire_count, max_fires, expires_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                priority = EXCLUDED.priority,
                tags = EXCLUDED.tags,
                cron_expr = EXCLUDED.cron_expr,
                timezone = EXCLUDED.timezone,
                human_rule = EXCLUDED.human_rule,
                auto_create = EXCLUDED.auto_create,
                notify = EXCLUDED.notify,
                template = EXCLUDED.template,
                active = EXCLUDED.active,
                next_fire = EXCLUDED.next_fire,
                last_fired = EXCLUDED.last_fired,
                fire_count = EXCLUDED.fire_count,
                max_fires = EXCLUDED.max_fires,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.kind)
        .bind(&schedule.chat_id)
        .bind(&schedule.title)
        .bind(&schedule.description)
        .bind(&schedule.category)
        .bind(&schedule.priority)
        .bind(&schedule.tags)
        .bind(&schedule.cron_expr)
        .bind(&schedule.timezone)
        .bind(&schedule.human_rule)
        .bind(schedule.auto_create)
        .bind(schedule.notify)
        .bind(&schedule.template)
        .bind(schedule.active)
        .bind(schedule.next_fire)
        .bind(schedule.last_fired)
        .bind(schedule.fire_count)
        .bind(schedule.max_fires)
        .bind(schedule.expires_at)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, chat_id: &str, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1 AND chat_id = $2")
            .bind(id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
