use std::collections::BTreeSet;

use super::CronError;

/// Bounds and name aliases for one of the five cron fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub min: u32,
    pub max: u32,
    pub aliases: &'static [(&'static str, u32)],
}

const WEEKDAY_ALIASES: &[(&str, u32)] = &[
    ("sun", 0),
    ("mon", 1),
    ("tue", 2),
    ("wed", 3),
    ("thu", 4),
    ("fri", 5),
    ("sat", 6),
];

const MONTH_ALIASES: &[(&str, u32)] = &[
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

pub const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    aliases: &[],
};

pub const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    aliases: &[],
};

pub const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    aliases: &[],
};

pub const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    aliases: MONTH_ALIASES,
};

pub const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 6,
    aliases: WEEKDAY_ALIASES,
};

/// Resolves a single cron field into the exact set of values it selects.
///
/// Comma-separated tokens are resolved independently and unioned. Each token
/// is one of `*`, `X/step`, `X-Y/step`, `*/step`, `X-Y` or `X`, after names
/// from the alias table have been replaced by their numbers.
pub fn parse_field(raw: &str, spec: &FieldSpec) -> Result<BTreeSet<u32>, CronError> {
    let invalid = |reason: String| CronError::InvalidField {
        field: spec.name,
        value: raw.to_string(),
        reason,
    };

    let mut values = BTreeSet::new();
    for token in raw.split(',') {
        let token = substitute_aliases(token, spec.aliases);
        values.extend(resolve_token(&token, spec).map_err(&invalid)?);
    }

    if values.is_empty() {
        return Err(invalid("selects no values".to_string()));
    }
    Ok(values)
}

fn resolve_token(token: &str, spec: &FieldSpec) -> Result<Vec<u32>, String> {
    if token.is_empty() {
        return Err("empty list element".to_string());
    }

    if token == "*" {
        return Ok((spec.min..=spec.max).collect());
    }

    if let Some((base, step)) = token.split_once('/') {
        let step: i64 = step
            .parse()
            .map_err(|_| format!("step `{step}` is not a number"))?;
        if step <= 0 {
            return Err(format!("step must be positive, got {step}"));
        }
        let (start, end) = if base == "*" {
            (spec.min, spec.max)
        } else if let Some((lo, hi)) = base.split_once('-') {
            resolve_range(lo, hi, spec)?
        } else {
            (resolve_value(base, spec)?, spec.max)
        };
        let step = usize::try_from(step).map_err(|_| format!("step {step} is too large"))?;
        return Ok((start..=end).step_by(step).collect());
    }

    if let Some((lo, hi)) = token.split_once('-') {
        let (start, end) = resolve_range(lo, hi, spec)?;
        return Ok((start..=end).collect());
    }

    Ok(vec![resolve_value(token, spec)?])
}

fn resolve_range(lo: &str, hi: &str, spec: &FieldSpec) -> Result<(u32, u32), String> {
    let start = resolve_value(lo, spec)?;
    let end = resolve_value(hi, spec)?;
    if start > end {
        return Err(format!("range {start}-{end} runs backwards"));
    }
    Ok((start, end))
}

fn resolve_value(raw: &str, spec: &FieldSpec) -> Result<u32, String> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("`{raw}` is not a number"));
    }
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is out of range {}-{}", spec.min, spec.max))?;
    if value < spec.min || value > spec.max {
        return Err(format!(
            "{value} is out of range {}-{}",
            spec.min, spec.max
        ));
    }
    Ok(value)
}

// whole-word and case-insensitive, so `MON-FRI` becomes `1-5` but `MONDAY` stays put
fn substitute_aliases(token: &str, aliases: &[(&str, u32)]) -> String {
    if aliases.is_empty() {
        return token.to_string();
    }

    let mut out = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(start) = rest.find(|c: char| c.is_ascii_alphabetic()) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(tail.len());
        let word = &tail[..end];
        match aliases.iter().find(|(name, _)| name.eq_ignore_ascii_case(word)) {
            Some((_, value)) => out.push_str(&value.to_string()),
            None => out.push_str(word),
        }
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}
