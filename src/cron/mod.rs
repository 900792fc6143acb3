//! Five-field cron expressions: `minute hour day-of-month month day-of-week`.
//!
//! Day-of-month and day-of-week are conjunctive here: both must match, unlike
//! classic cron which fires when either matches once both are restricted.

mod field;

pub use field::{DAY_OF_MONTH, DAY_OF_WEEK, FieldSpec, HOUR, MINUTE, MONTH, parse_field};

use chrono::{DateTime, Datelike, DurationRound, TimeDelta, TimeZone, Timelike, Utc};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

/// One year of minutes; the forward scan gives up after this many steps.
pub const SCAN_LIMIT_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("cron expression must have 5 fields, found {found}")]
    FieldCount { found: usize },
    #[error("invalid {field} field `{value}`: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("`{expr}` has no occurrence within one year")]
    BoundsExceeded { expr: String },
}

/// A parsed cron expression holding the explicit value set of every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
}

impl CronExpr {
    pub fn minutes(&self) -> &BTreeSet<u32> {
        &self.minutes
    }

    pub fn hours(&self) -> &BTreeSet<u32> {
        &self.hours
    }

    pub fn days_of_month(&self) -> &BTreeSet<u32> {
        &self.days_of_month
    }

    pub fn months(&self) -> &BTreeSet<u32> {
        &self.months
    }

    pub fn days_of_week(&self) -> &BTreeSet<u32> {
        &self.days_of_week
    }

    /// Whether every field matches the wall-clock reading of `local`.
    pub fn matches<Tz: TimeZone>(&self, local: &DateTime<Tz>) -> bool {
        self.minutes.contains(&local.minute())
            && self.hours.contains(&local.hour())
            && self.days_of_month.contains(&local.day())
            && self.months.contains(&local.month())
            && self.days_of_week.contains(&local.weekday().num_days_from_sunday())
    }

    /// Earliest whole minute strictly after `after` whose local time in `tz`
    /// matches, or `None` when nothing matches within [`SCAN_LIMIT_MINUTES`].
    pub fn next_after<Tz: TimeZone>(&self, tz: &Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let step = TimeDelta::minutes(1);
        let mut current = after.duration_trunc(step).unwrap_or(after) + step;
        for _ in 0..SCAN_LIMIT_MINUTES {
            if self.matches(&current.with_timezone(tz)) {
                return Some(current);
            }
            current += step;
        }
        None
    }
}

impl FromStr for CronExpr {
    type Err = CronError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let &[minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(CronError::FieldCount {
                found: fields.len(),
            });
        };

        let minutes = parse_field(minute, &MINUTE)?;
        let hours = parse_field(hour, &HOUR)?;
        let days_of_month = parse_field(dom, &DAY_OF_MONTH)?;
        let months = parse_field(month, &MONTH)?;
        let days_of_week = parse_field(dow, &DAY_OF_WEEK)?;
        ensure_day_exists(&days_of_month, &months, dom)?;

        Ok(Self {
            source: fields.join(" "),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
        })
    }
}

// February counts 29 so leap-day rules stay valid.
const DAYS_IN_MONTH: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Rejects day-of-month/month pairs that never occur on a calendar, such as
/// `30 2` or `31 4,6`.
fn ensure_day_exists(
    days_of_month: &BTreeSet<u32>,
    months: &BTreeSet<u32>,
    raw: &str,
) -> Result<(), CronError> {
    let longest = months
        .iter()
        .filter_map(|m| DAYS_IN_MONTH.get(*m as usize - 1))
        .copied()
        .max()
        .unwrap_or(31);
    match days_of_month.first() {
        Some(&first) if first > longest => Err(CronError::InvalidField {
            field: DAY_OF_MONTH.name,
            value: raw.to_string(),
            reason: format!("no selected month has {first} days"),
        }),
        _ => Ok(()),
    }
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

pub fn parse_cron(expr: &str) -> Result<CronExpr, CronError> {
    expr.parse()
}

pub fn is_valid_cron(expr: &str) -> bool {
    parse_cron(expr).is_ok()
}

/// Next matching instant after `after`, evaluating fields in `tz` local time.
pub fn next_fire<Tz: TimeZone>(
    expr: &str,
    tz: &Tz,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, CronError> {
    let parsed = parse_cron(expr)?;
    parsed
        .next_after(tz, after)
        .ok_or_else(|| CronError::BoundsExceeded {
            expr: parsed.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn wildcard_expression_has_full_cardinalities() {
        let expr = parse_cron("* * * * *").unwrap();
        assert_eq!(expr.minutes().len(), 60);
        assert_eq!(expr.hours().len(), 24);
        assert_eq!(expr.days_of_month().len(), 31);
        assert_eq!(expr.months().len(), 12);
        assert_eq!(expr.days_of_week().len(), 7);
    }

    #[test]
    fn mixed_expression_cardinalities() {
        let expr = parse_cron("*/10 9-17 1,15 JAN-JUN mon-fri").unwrap();
        assert_eq!(expr.minutes().len(), 6);
        assert_eq!(expr.hours().len(), 9);
        assert_eq!(expr.days_of_month().len(), 2);
        assert_eq!(expr.months().len(), 6);
        assert_eq!(expr.days_of_week().len(), 5);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(
            parse_cron("* * *").unwrap_err(),
            CronError::FieldCount { found: 3 }
        );
        assert_eq!(
            parse_cron("0 0 * * * *").unwrap_err(),
            CronError::FieldCount { found: 6 }
        );
        assert!(matches!(
            parse_cron("").unwrap_err(),
            CronError::FieldCount { found: 0 }
        ));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(matches!(
            parse_cron("60 * * * *").unwrap_err(),
            CronError::InvalidField { field: "minute", .. }
        ));
        assert!(!is_valid_cron("not a cron"));
        assert!(!is_valid_cron("* 24 * * *"));
        assert!(!is_valid_cron("* * 32 * *"));
        assert!(!is_valid_cron("* * * 13 *"));
        assert!(!is_valid_cron("* * * * 7"));
        assert!(!is_valid_cron("*/0 * * * *"));
        assert!(is_valid_cron("0 9 * * 1-5"));
        assert!(is_valid_cron("  0   9 * * MON  "));
    }

    #[test]
    fn quarter_hour_step_lands_on_quarter_minutes() {
        let mut after = utc(2026, 2, 12, 10, 7);
        for _ in 0..12 {
            let next = next_fire("*/15 * * * *", &Utc, after).unwrap();
            assert!(next > after);
            assert!([0, 15, 30, 45].contains(&next.minute()));
            assert!(next - after <= TimeDelta::minutes(15));
            after = next;
        }
    }

    #[test]
    fn result_is_strictly_after_and_minute_aligned() {
        let after = Utc.with_ymd_and_hms(2026, 2, 12, 9, 0, 0).unwrap();
        assert_eq!(
            next_fire("0 9 * * *", &Utc, after).unwrap(),
            utc(2026, 2, 13, 9, 0)
        );

        let mid_minute = after + TimeDelta::seconds(42);
        let next = next_fire("* * * * *", &Utc, mid_minute).unwrap();
        assert_eq!(next, utc(2026, 2, 12, 9, 1));
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn weekly_rule_from_thursday_lands_on_monday() {
        // 2026-02-12 is a Thursday
        let next = next_fire("0 9 * * 1", &Utc, utc(2026, 2, 12, 10, 30)).unwrap();
        assert_eq!(next, utc(2026, 2, 16, 9, 0));
        assert_eq!(next.weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn fields_are_matched_in_local_time() {
        // 09:00 EST is 14:00 UTC
        let next = next_fire("0 9 * * 1", &New_York, utc(2026, 2, 12, 15, 0)).unwrap();
        assert_eq!(next, utc(2026, 2, 16, 14, 0));
    }

    #[test]
    fn nine_am_survives_daylight_saving_start() {
        // DST starts Sunday 2026-03-08; 09:00 EDT is 13:00 UTC
        let friday_fire = utc(2026, 3, 6, 14, 0);
        let next = next_fire("0 9 * * 1-5", &New_York, friday_fire).unwrap();
        assert_eq!(next, utc(2026, 3, 9, 13, 0));
    }

    #[test]
    fn day_of_month_and_weekday_are_both_required() {
        // first Friday the 13th of 2026 is in February
        let next = next_fire("0 0 13 * 5", &Utc, utc(2026, 1, 1, 0, 0)).unwrap();
        assert_eq!(next, utc(2026, 2, 13, 0, 0));
    }

    #[test]
    fn rejects_days_that_no_selected_month_has() {
        for expr in ["0 0 30 2 *", "0 0 31 4,6,9,11 *", "0 0 30-31 feb *"] {
            assert!(
                matches!(
                    parse_cron(expr).unwrap_err(),
                    CronError::InvalidField { field: "day-of-month", .. }
                ),
                "{expr}"
            );
        }
        assert!(is_valid_cron("0 0 31 2,3 *"));
        assert!(is_valid_cron("0 0 1,30 2 *"));
    }

    #[test]
    fn leap_day_rule_is_valid_but_can_be_out_of_reach() {
        assert!(is_valid_cron("0 0 29 2 *"));
        assert_eq!(
            next_fire("0 0 29 2 *", &Utc, utc(2027, 6, 1, 0, 0)).unwrap(),
            utc(2028, 2, 29, 0, 0)
        );
        // the next 29 February after 2026-02-12 is more than a year away
        assert_eq!(
            next_fire("0 0 29 2 *", &Utc, utc(2026, 2, 12, 0, 0)).unwrap_err(),
            CronError::BoundsExceeded {
                expr: "0 0 29 2 *".to_string()
            }
        );
    }

    #[test]
    fn repeated_hour_after_daylight_saving_ends_matches_twice() {
        // 2026-11-01 01:30 happens at 05:30 UTC (EDT) and again at 06:30 UTC (EST)
        let first = next_fire("30 1 * * *", &New_York, utc(2026, 11, 1, 4, 0)).unwrap();
        assert_eq!(first, utc(2026, 11, 1, 5, 30));
        let second = next_fire("30 1 * * *", &New_York, first).unwrap();
        assert_eq!(second, utc(2026, 11, 1, 6, 30));
        let third = next_fire("30 1 * * *", &New_York, second).unwrap();
        assert_eq!(third, utc(2026, 11, 2, 6, 30));
    }

    #[test]
    fn valid_expressions_always_produce_a_next_fire() {
        let after = utc(2026, 2, 12, 10, 0);
        for expr in [
            "* * * * *",
            "0 0 1 1 *",
            "30 23 31 12 *",
            "0 9 * * 1-5",
            "*/7 */5 * * SUN",
            "0 12 1-7 * MON",
            "5,10 4 28 2 *",
            "0 0 31 2,3 *",
        ] {
            assert!(is_valid_cron(expr), "{expr}");
            assert!(next_fire(expr, &Utc, after).is_ok(), "{expr}");
        }
    }
}
