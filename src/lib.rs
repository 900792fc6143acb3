//! Personal task-triage bot: recurring schedules that turn into tasks and
//! reminders.
//!
//! [`cron`] evaluates five-field expressions, [`services::ScheduleManager`]
//! owns the schedule lifecycle and [`functions::FireRunner`] sweeps due
//! schedules from the clock daemon.

pub mod config;
pub mod cron;
pub mod functions;
pub mod schema;
pub mod services;
