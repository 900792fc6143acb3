use crate::schema::{Schedule, ScheduleRequest};
use crate::services::{Notifier, ScheduleError, ScheduleManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schedule intents decided by the triage model, already structured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScheduleIntent {
    Create(ScheduleRequest),
    Pause {
        schedule_id: Uuid,
    },
    Resume {
        schedule_id: Uuid,
    },
    UpdateCron {
        schedule_id: Uuid,
        cron_expr: String,
        human_rule: String,
        #[serde(default)]
        timezone: Option<String>,
    },
    Delete {
        schedule_id: Uuid,
    },
}

impl ScheduleIntent {
    fn action(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
            Self::UpdateCron { .. } => "update_cron",
            Self::Delete { .. } => "delete",
        }
    }
}

fn rejection_reply(err: &ScheduleError) -> String {
    match err {
        ScheduleError::InvalidCronExpression { expr, .. } => format!(
            "I couldn't turn that into a schedule (`{expr}` isn't a valid rule). Could you rephrase when it should happen?"
        ),
        ScheduleError::InvalidTimezone(tz) => {
            format!("I don't know the timezone `{tz}`. Could you name a city or region instead?")
        }
        ScheduleError::ComputationBoundsExceeded { .. } => {
            "That rule never comes up within the next year. Could you rephrase it?".to_string()
        }
        other => format!("Couldn't update the schedule: {other}."),
    }
}

fn confirmation_reply(action: &str, schedule: Option<&Schedule>) -> String {
    let Some(schedule) = schedule else {
        return "Schedule deleted.".to_string();
    };
    let when = schedule.next_fire.format("%Y-%m-%d %H:%M UTC");
    match action {
        "create" => format!(
            "Scheduled \"{}\" ({}). First run {when}.",
            schedule.title, schedule.human_rule
        ),
        "pause" => format!("Paused \"{}\".", schedule.title),
        "resume" => format!("Resumed \"{}\". Next run {when}.", schedule.title),
        _ => format!(
            "Updated \"{}\" to {}. Next run {when}.",
            schedule.title, schedule.human_rule
        ),
    }
}

/// Applies one intent for `chat_id` and queues a reply for the user.
///
/// Rejections the user can act on become replies and return `Ok(None)`;
/// storage failures propagate.
pub async fn apply_intent(
    manager: &ScheduleManager,
    notifier: &dyn Notifier,
    chat_id: &str,
    intent: ScheduleIntent,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Schedule>> {
    let action = intent.action();
    let outcome = match intent {
        ScheduleIntent::Create(request) => manager.create(chat_id, request, now).await.map(Some),
        ScheduleIntent::Pause { schedule_id } => {
            manager.pause(chat_id, schedule_id, now).await.map(Some)
        }
        ScheduleIntent::Resume { schedule_id } => {
            manager.resume(chat_id, schedule_id, now).await.map(Some)
        }
        ScheduleIntent::UpdateCron {
            schedule_id,
            cron_expr,
            human_rule,
            timezone,
        } => manager
            .update_cron(
                chat_id,
                schedule_id,
                &cron_expr,
                &human_rule,
                timezone.as_deref(),
                now,
            )
            .await
            .map(Some),
        ScheduleIntent::Delete { schedule_id } => {
            manager.delete(chat_id, schedule_id).await.map(|()| None)
        }
    };

    match outcome {
        Ok(schedule) => {
            notifier
                .notify(chat_id, &confirmation_reply(action, schedule.as_ref()))
                .await?;
            Ok(schedule)
        }
        Err(err) if err.is_user_facing() => {
            tracing::info!(chat_id, action, error = %err, "intake: schedule intent rejected");
            notifier.notify(chat_id, &rejection_reply(&err)).await?;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::memory::MemoryScheduleStore;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const CHAT: &str = "owner@chat";

    #[derive(Default)]
    struct Replies(Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl Notifier for Replies {
        async fn notify(&self, _chat_id: &str, text: &str) -> anyhow::Result<()> {
            self.0.lock().await.push(text.to_string());
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 12, 12, 0, 0).unwrap()
    }

    fn manager() -> ScheduleManager {
        ScheduleManager::new(Arc::new(MemoryScheduleStore::new()))
    }

    #[test]
    fn parses_tagged_intents() {
        let intent: ScheduleIntent = serde_json::from_value(serde_json::json!({
            "action": "create",
            "title": "Gym",
            "cron_expr": "0 7 * * MON,WED,FRI",
            "human_rule": "Mon/Wed/Fri at 7am",
            "max_fires": 12
        }))
        .unwrap();
        let ScheduleIntent::Create(request) = intent else {
            panic!("expected create intent");
        };
        assert_eq!(request.max_fires, Some(12));

        let id = Uuid::new_v4();
        let intent: ScheduleIntent = serde_json::from_value(serde_json::json!({
            "action": "update_cron",
            "schedule_id": id,
            "cron_expr": "0 8 * * *",
            "human_rule": "daily at 8"
        }))
        .unwrap();
        assert!(matches!(
            intent,
            ScheduleIntent::UpdateCron { schedule_id, timezone: None, .. } if schedule_id == id
        ));
    }

    #[tokio::test]
    async fn create_confirms_with_first_run() {
        let manager = manager();
        let replies = Replies::default();
        let mut request = ScheduleRequest::new("Gym", "0 7 * * MON", "Mondays at 7am");
        request.timezone = Some("UTC".to_string());

        let created = apply_intent(&manager, &replies, CHAT, ScheduleIntent::Create(request), now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created.chat_id, CHAT);
        assert_eq!(
            replies.0.lock().await.clone(),
            vec!["Scheduled \"Gym\" (Mondays at 7am). First run 2026-02-16 07:00 UTC.".to_string()]
        );
    }

    #[tokio::test]
    async fn bad_rule_is_rejected_with_a_rephrase_prompt() {
        let manager = manager();
        let replies = Replies::default();
        let request = ScheduleRequest::new("Gym", "every monday", "Mondays");

        let result = apply_intent(&manager, &replies, CHAT, ScheduleIntent::Create(request), now())
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(manager.list_active(CHAT).await.unwrap().is_empty());
        let replies = replies.0.lock().await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("rephrase"));
    }

    #[tokio::test]
    async fn pause_resume_and_delete_round_through_the_manager() {
        let manager = manager();
        let replies = Replies::default();
        let mut request = ScheduleRequest::new("Stand up", "0 * * * *", "hourly");
        request.timezone = Some("UTC".to_string());
        let created = manager.create(CHAT, request, now()).await.unwrap();
        let id = created.id;

        let paused = apply_intent(&manager, &replies, CHAT, ScheduleIntent::Pause { schedule_id: id }, now())
            .await
            .unwrap()
            .unwrap();
        assert!(!paused.active);

        let resumed = apply_intent(&manager, &replies, CHAT, ScheduleIntent::Resume { schedule_id: id }, now())
            .await
            .unwrap()
            .unwrap();
        assert!(resumed.active);

        let deleted = apply_intent(&manager, &replies, CHAT, ScheduleIntent::Delete { schedule_id: id }, now())
            .await
            .unwrap();
        assert!(deleted.is_none());

        let missing = apply_intent(&manager, &replies, CHAT, ScheduleIntent::Pause { schedule_id: id }, now())
            .await
            .unwrap();
        assert!(missing.is_none());

        let replies = replies.0.lock().await;
        assert_eq!(replies[0], "Paused \"Stand up\".");
        assert_eq!(replies[1], "Resumed \"Stand up\". Next run 2026-02-12 13:00 UTC.");
        assert_eq!(replies[2], "Schedule deleted.");
        assert!(replies[3].contains("not found"));
    }
}
