use crate::config::ClockSettings;
use crate::schema::{NewTask, Schedule, ScheduleKind};
use crate::services::{
    DigestSource, Notifier, OutboxNotifier, PgDigest, PgScheduleStore, PgTaskSink,
    ScheduleError, ScheduleManager, TaskSink,
};
use chrono::{DateTime, Utc};
use forge::prelude::*;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub fired: u32,
    pub expired: u32,
    pub failed: u32,
}

impl SweepReport {
    pub fn processed(&self) -> u32 {
        self.fired + self.expired + self.failed
    }
}

/// Substitutes `{date}` in the template with the local date of the fire.
pub fn render_title(schedule: &Schedule, now: DateTime<Utc>) -> String {
    let Some(template) = schedule.template.as_deref() else {
        return schedule.title.clone();
    };
    let date = match schedule.timezone.parse::<chrono_tz::Tz>() {
        Ok(tz) => now.with_timezone(&tz).format("%Y-%m-%d").to_string(),
        Err(_) => now.format("%Y-%m-%d").to_string(),
    };
    template.replace("{date}", &date)
}

pub fn format_reminder(schedule: &Schedule, title: &str, task_created: bool) -> String {
    let mut text = format!("Reminder: {title}");
    if let Some(max) = schedule.max_fires {
        text.push_str(&format!(" ({}/{max})", schedule.fire_count + 1));
    }
    if let Some(description) = schedule.description.as_deref() {
        text.push('\n');
        text.push_str(description);
    }
    if task_created {
        text.push_str("\nAdded to your task list.");
    }
    text
}

/// One sweep over due schedules: run each one's effects, then advance it.
pub struct FireRunner {
    manager: ScheduleManager,
    tasks: Arc<dyn TaskSink>,
    notifier: Arc<dyn Notifier>,
    digest: Arc<dyn DigestSource>,
}

impl FireRunner {
    pub fn new(
        manager: ScheduleManager,
        tasks: Arc<dyn TaskSink>,
        notifier: Arc<dyn Notifier>,
        digest: Arc<dyn DigestSource>,
    ) -> Self {
        Self {
            manager,
            tasks,
            notifier,
            digest,
        }
    }

    pub fn manager(&self) -> &ScheduleManager {
        &self.manager
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> std::result::Result<SweepReport, ScheduleError> {
        let due = self.manager.list_due(now).await?;
        let mut report = SweepReport::default();
        if due.is_empty() {
            return Ok(report);
        }

        tracing::debug!(count = due.len(), "clock: processing due schedules");

        for schedule in &due {
            if schedule.misses_deadline() {
                match self.manager.expire(schedule, now).await {
                    Ok(_) => report.expired += 1,
                    Err(err) => {
                        tracing::error!(
                            schedule_id = %schedule.id,
                            title = %schedule.title,
                            error = %err,
                            "clock: failed to expire schedule"
                        );
                        report.failed += 1;
                    }
                }
                continue;
            }

            match self.fire(schedule, now).await {
                Ok(()) => report.fired += 1,
                Err(err) => {
                    tracing::error!(
                        schedule_id = %schedule.id,
                        title = %schedule.title,
                        error = %err,
                        "clock: schedule fire failed, leaving it due"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn fire(&self, schedule: &Schedule, now: DateTime<Utc>) -> anyhow::Result<()> {
        match schedule.kind {
            ScheduleKind::Digest => {
                let text = self.digest.build_digest(&schedule.chat_id, now).await?;
                self.notifier.notify(&schedule.chat_id, &text).await?;
            }
            ScheduleKind::Recurring => {
                let title = render_title(schedule, now);
                let mut task_created = false;
                if schedule.auto_create {
                    let task_id = self
                        .tasks
                        .create_task(NewTask {
                            chat_id: schedule.chat_id.clone(),
                            title: title.clone(),
                            description: schedule.description.clone(),
                            category: schedule.category.clone(),
                            priority: schedule.priority.clone(),
                            tags: schedule.tags.clone(),
                            schedule_id: Some(schedule.id),
                        })
                        .await?;
                    task_created = true;
                    tracing::debug!(schedule_id = %schedule.id, %task_id, "clock: task created");
                }
                if schedule.notify {
                    let text = format_reminder(schedule, &title, task_created);
                    self.notifier.notify(&schedule.chat_id, &text).await?;
                }
            }
        }

        let advanced = self.manager.mark_fired(schedule, now).await?;
        tracing::info!(
            schedule_id = %schedule.id,
            title = %schedule.title,
            fire_count = advanced.fire_count,
            active = advanced.active,
            next_fire = %advanced.next_fire,
            "clock: fired schedule"
        );
        Ok(())
    }
}

#[forge::daemon]
pub async fn clock(ctx: &DaemonContext) -> Result<()> {
    let settings = ClockSettings::from_env();
    let pool = ctx.db().clone();

    let manager = ScheduleManager::new(Arc::new(PgScheduleStore::new(pool.clone())))
        .with_default_timezone(settings.default_timezone.clone());

    if let Some(chat_id) = settings.owner_chat_id.as_deref()
        && let Err(e) = manager
            .ensure_digest(
                chat_id,
                &settings.digest_cron,
                &settings.default_timezone,
                Utc::now(),
            )
            .await
    {
        tracing::error!(chat_id, error = %e, "clock: failed to seed digest schedule");
    }

    let runner = FireRunner::new(
        manager,
        Arc::new(PgTaskSink::new(pool.clone())),
        Arc::new(OutboxNotifier::new(pool.clone())),
        Arc::new(PgDigest::new(pool)),
    );

    loop {
        tokio::select! {
            _ = ctx.shutdown_signal() => break,
            _ = tokio::time::sleep(settings.poll_interval()) => {
                match runner.sweep(Utc::now()).await {
                    Ok(report) if report.processed() > 0 => tracing::info!(
                        fired = report.fired,
                        expired = report.expired,
                        failed = report.failed,
                        "clock tick"
                    ),
                    Err(e) => tracing::error!(error = %e, "clock tick failed"),
                    _ => {}
                }
            }
        }
    }
    Ok(())
}
