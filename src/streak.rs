use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missed_message: Option<String>,
}

/// Derives the next login streak.
///
/// Days are compared as calendar dates in the timezone of `now`, so a login
/// at 23:50 followed by one at 00:10 counts as consecutive days:
///
/// - same date as the last login: streak unchanged
/// - the day after: streak + 1
/// - later than that: streak restarts at 1 with a message picked by how
///   many days have passed
///
/// A first login starts the streak at 1. A last login dated after `now`
/// counts as the same day.
pub fn calculate_streak<Tz: TimeZone>(
    last_login: Option<DateTime<Utc>>,
    current_streak: u32,
    now: DateTime<Tz>,
) -> StreakUpdate {
    let Some(last_login) = last_login else {
        return StreakUpdate { streak: 1, missed_message: None };
    };

    let today = now.date_naive();
    let last_day = last_login.with_timezone(&now.timezone()).date_naive();
    let days_since_login = (today - last_day).num_days();

    match days_since_login {
        d if d <= 0 => StreakUpdate {
            streak: current_streak,
            missed_message: None,
        },
        1 => StreakUpdate {
            streak: current_streak.saturating_add(1),
            missed_message: None,
        },
        d => StreakUpdate {
            streak: 1,
            missed_message: Some(missed_message(d)),
        },
    }
}

fn missed_message(days_since_login: i64) -> String {
    match days_since_login {
        2 => "We missed you yesterday! Your streak starts fresh today.".to_string(),
        d if d <= 7 => format!(
            "We missed you for {} days! Let's build a new streak.",
            d - 1
        ),
        d if d <= 30 => "It's been a while! Pick up right where you left off.".to_string(),
        _ => "Welcome back! Today is a great day to restart your journey.".to_string(),
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (taken as UTC midnight).
pub fn parse_login_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
