use crate::schema::NewTask;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait TaskSink: Send + Sync {
    async fn create_task(&self, task: NewTask) -> anyhow::Result<Uuid>;
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat_id: &str, text: &str) -> anyhow::Result<()>;
}

/// Builds the digest message from the current task board.
#[async_trait::async_trait]
pub trait DigestSource: Send + Sync {
    async fn build_digest(&self, chat_id: &str, now: DateTime<Utc>) -> anyhow::Result<String>;
}

pub struct PgTaskSink {
    pool: PgPool,
}

impl PgTaskSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TaskSink for PgTaskSink {
    async fn create_task(&self, task: NewTask) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO tasks (id, chat_id, title, description, category, priority, tags, schedule_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&task.chat_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.category)
        .bind(&task.priority)
        .bind(&task.tags)
        .bind(task.schedule_id)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}

/// Queues messages in the outbox; the transport delivers them.
pub struct OutboxNotifier {
    pool: PgPool,
}

impl OutboxNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Notifier for OutboxNotifier {
    async fn notify(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO outbox (id, chat_id, content) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(chat_id)
            .bind(text)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestSummary {
    pub open_by_priority: Vec<(String, i64)>,
    pub top_open: Vec<String>,
    pub created_last_day: i64,
    pub completed_last_day: i64,
}

pub fn format_digest(summary: &DigestSummary) -> String {
    let open: i64 = summary.open_by_priority.iter().map(|(_, n)| n).sum();
    if open == 0 && summary.created_last_day == 0 && summary.completed_last_day == 0 {
        return "Daily digest: your board is clear.".to_string();
    }

    let mut text = format!("Daily digest: {open} open");
    if !summary.open_by_priority.is_empty() {
        let parts: Vec<String> = summary
            .open_by_priority
            .iter()
            .map(|(priority, n)| format!("{n} {priority}"))
            .collect();
        text.push_str(&format!(" ({})", parts.join(", ")));
    }
    text.push_str(&format!(
        ", {} added and {} done in the last day.",
        summary.created_last_day, summary.completed_last_day
    ));

    if !summary.top_open.is_empty() {
        text.push_str("\nUp next:");
        for title in &summary.top_open {
            text.push_str(&format!("\n- {title}"));
        }
    }
    text
}

pub struct PgDigest {
    pool: PgPool,
}

impl PgDigest {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn summarize(&self, chat_id: &str, now: DateTime<Utc>) -> anyhow::Result<DigestSummary> {
        let since = now - TimeDelta::days(1);

        let open_by_priority = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT priority, COUNT(*)::bigint
            FROM tasks
            WHERE chat_id = $1 AND status <> 'done'
            GROUP BY priority
            ORDER BY CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1
                                   WHEN 'medium' THEN 2 ELSE 3 END
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        let top_open = sqlx::query_scalar::<_, String>(
            r#"
            SELECT title
            FROM tasks
            WHERE chat_id = $1 AND status <> 'done'
            ORDER BY CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1
                                   WHEN 'medium' THEN 2 ELSE 3 END,
                     created_at
            LIMIT 5
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        let created_last_day = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::bigint FROM tasks WHERE chat_id = $1 AND created_at >= $2",
        )
        .bind(chat_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let completed_last_day = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)::bigint
            FROM tasks
            WHERE chat_id = $1 AND status = 'done' AND updated_at >= $2
            "#,
        )
        .bind(chat_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(DigestSummary {
            open_by_priority,
            top_open,
            created_last_day,
            completed_last_day,
        })
    }
}

#[async_trait::async_trait]
impl DigestSource for PgDigest {
    async fn build_digest(&self, chat_id: &str, now: DateTime<Utc>) -> anyhow::Result<String> {
        let summary = self.summarize(chat_id, now).await?;
        Ok(format_digest(&summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_digest() {
        assert_eq!(
            format_digest(&DigestSummary::default()),
            "Daily digest: your board is clear."
        );
    }

    #[test]
    fn digest_lists_counts_and_top_tasks() {
        let summary = DigestSummary {
            open_by_priority: vec![("high".to_string(), 2), ("medium".to_string(), 3)],
            top_open: vec!["File taxes".to_string(), "Call dentist".to_string()],
            created_last_day: 4,
            completed_last_day: 1,
        };

        assert_eq!(
            format_digest(&summary),
            "Daily digest: 5 open (2 high, 3 medium), 4 added and 1 done in the last day.\n\
             Up next:\n- File taxes\n- Call dentist"
        );
    }
}
