use crate::config::ClockSettings;
use crate::functions::intake::{ScheduleIntent, apply_intent};
use crate::schema::{Schedule, ScheduleRequest};
use crate::services::{OutboxNotifier, PgScheduleStore, ScheduleError, ScheduleManager};
use chrono::Utc;
use forge::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ListSchedulesInput {
    pub chat_id: Option<String>,
    pub active_only: Option<bool>,
    pub limit: Option<i64>,
}

#[forge::query(public)]
pub async fn list_schedules(
    ctx: &QueryContext,
    input: ListSchedulesInput,
) -> Result<Vec<Schedule>> {
    let limit = input.limit.unwrap_or(50).min(200);
    let active_only = input.active_only.unwrap_or(false);

    sqlx::query_as::<_, Schedule>(
        r#"
        SELECT id, kind, chat_id, title, description, category, priority, tags,
               cron_expr, timezone, human_rule, auto_create, notify, template,
               active, next_fire, last_fired, fire_count, max_fires, expires_at,
               created_at, updated_at
        FROM schedules
        WHERE ($1::text IS NULL OR chat_id = $1)
          AND (NOT $2 OR active = true)
        ORDER BY active DESC, next_fire, id
        LIMIT $3
        "#,
    )
    .bind(input.chat_id)
    .bind(active_only)
    .bind(limit)
    .fetch_all(ctx.db())
    .await
    .map_err(|e| ForgeError::Database(e.to_string()))
}

fn schedule_manager(db: &sqlx::PgPool) -> ScheduleManager {
    let settings = ClockSettings::from_env();
    ScheduleManager::new(Arc::new(PgScheduleStore::new(db.clone())))
        .with_default_timezone(settings.default_timezone)
}

fn schedule_error(err: ScheduleError) -> ForgeError {
    if err.is_user_facing() {
        ForgeError::Validation(err.to_string())
    } else {
        tracing::error!(error = %err, "dashboard: schedule store failure");
        ForgeError::Internal(err.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateScheduleInput {
    pub chat_id: String,
    pub request: ScheduleRequest,
}

#[forge::mutation(public)]
pub async fn create_schedule(ctx: &MutationContext, input: CreateScheduleInput) -> Result<Schedule> {
    schedule_manager(ctx.pool())
        .create(&input.chat_id, input.request, Utc::now())
        .await
        .map_err(schedule_error)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRef {
    pub chat_id: String,
    pub schedule_id: Uuid,
}

#[forge::mutation(public)]
pub async fn pause_schedule(ctx: &MutationContext, input: ScheduleRef) -> Result<Schedule> {
    schedule_manager(ctx.pool())
        .pause(&input.chat_id, input.schedule_id, Utc::now())
        .await
        .map_err(schedule_error)
}

#[forge::mutation(public)]
pub async fn resume_schedule(ctx: &MutationContext, input: ScheduleRef) -> Result<Schedule> {
    schedule_manager(ctx.pool())
        .resume(&input.chat_id, input.schedule_id, Utc::now())
        .await
        .map_err(schedule_error)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateScheduleCronInput {
    pub chat_id: String,
    pub schedule_id: Uuid,
    pub cron_expr: String,
    pub human_rule: String,
    pub timezone: Option<String>,
}

#[forge::mutation(public)]
pub async fn update_schedule_cron(
    ctx: &MutationContext,
    input: UpdateScheduleCronInput,
) -> Result<Schedule> {
    schedule_manager(ctx.pool())
        .update_cron(
            &input.chat_id,
            input.schedule_id,
            &input.cron_expr,
            &input.human_rule,
            input.timezone.as_deref(),
            Utc::now(),
        )
        .await
        .map_err(schedule_error)
}

#[derive(Debug, Serialize)]
pub struct DeleteScheduleOutput {
    pub deleted: bool,
}

#[forge::mutation(public)]
pub async fn delete_schedule(
    ctx: &MutationContext,
    input: ScheduleRef,
) -> Result<DeleteScheduleOutput> {
    schedule_manager(ctx.pool())
        .delete(&input.chat_id, input.schedule_id)
        .await
        .map_err(schedule_error)?;
    Ok(DeleteScheduleOutput { deleted: true })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyScheduleIntentInput {
    pub chat_id: String,
    pub intent: ScheduleIntent,
}

#[derive(Debug, Serialize)]
pub struct ApplyScheduleIntentOutput {
    pub schedule: Option<Schedule>,
}

/// Entry point for the triage side: the reply to the user is queued in the
/// outbox either way, rejections included.
#[forge::mutation(public)]
pub async fn apply_schedule_intent(
    ctx: &MutationContext,
    input: ApplyScheduleIntentInput,
) -> Result<ApplyScheduleIntentOutput> {
    let db = ctx.pool();
    let notifier = OutboxNotifier::new(db.clone());
    let schedule = apply_intent(
        &schedule_manager(db),
        &notifier,
        &input.chat_id,
        input.intent,
        Utc::now(),
    )
    .await
    .map_err(|e| ForgeError::Internal(e.to_string()))?;
    Ok(ApplyScheduleIntentOutput { schedule })
}
