use crate::cron::is_valid_cron;
use crate::schema::DEFAULT_TIMEZONE;

pub const DEFAULT_POLL_MS: u64 = 60_000;
pub const DEFAULT_DIGEST_CRON: &str = "0 8 * * *";

/// Clock daemon settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockSettings {
    pub poll_ms: u64,
    pub default_timezone: String,
    pub owner_chat_id: Option<String>,
    pub digest_cron: String,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            poll_ms: DEFAULT_POLL_MS,
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            owner_chat_id: None,
            digest_cron: DEFAULT_DIGEST_CRON.to_string(),
        }
    }
}

impl ClockSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(raw) = lookup("TASKLING_LOOP_POLL_MS_CLOCK") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => settings.poll_ms = ms,
                _ => tracing::warn!(value = %raw, "ignoring invalid TASKLING_LOOP_POLL_MS_CLOCK"),
            }
        }

        if let Some(tz) = lookup("TASKLING_DEFAULT_TIMEZONE") {
            if tz.parse::<chrono_tz::Tz>().is_ok() {
                settings.default_timezone = tz;
            } else {
                tracing::warn!(value = %tz, "ignoring unknown TASKLING_DEFAULT_TIMEZONE");
            }
        }

        settings.owner_chat_id = lookup("TASKLING_CHAT_ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        if let Some(cron) = lookup("TASKLING_DIGEST_CRON") {
            if is_valid_cron(&cron) {
                settings.digest_cron = cron;
            } else {
                tracing::warn!(value = %cron, "ignoring invalid TASKLING_DIGEST_CRON");
            }
        }

        settings
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_ms)
    }
}
