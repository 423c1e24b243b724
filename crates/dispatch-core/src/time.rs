use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type Timestamp = DateTime<Utc>;

/// Calendar bucket relative to a reference "now", evaluated in a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    #[default]
    All,
    Day,
    Month,
    Year,
}

impl TimeWindow {
    /// Half-open `[start, end)` range in UTC, or `None` for `All`.
    pub fn range(&self, now: Timestamp, offset: FixedOffset) -> Option<(Timestamp, Timestamp)> {
        let today = now.with_timezone(&offset).date_naive();
        let (start, end) = match self {
            Self::All => return None,
            Self::Day => (today, today.succ_opt()?),
            Self::Month => {
                let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?;
                let end = if today.month() == 12 {
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)?
                };
                (start, end)
            }
            Self::Year => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?,
            ),
        };
        Some((local_midnight(start, offset)?, local_midnight(end, offset)?))
    }

    pub fn contains(&self, at: Timestamp, now: Timestamp, offset: FixedOffset) -> bool {
        match self {
            Self::All => true,
            _ => self
                .range(now, offset)
                .map(|(start, end)| at >= start && at < end)
                .unwrap_or(false),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "day" | "today" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(()),
        }
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Option<Timestamp> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|value| value.with_timezone(&Utc))
}
