use chrono::FixedOffset;
use dispatch_core::{Report, TimeWindow, Timestamp};
use serde::{Deserialize, Serialize};

/// Search over resolved reports: a case-insensitive name substring plus a
/// calendar window on the resolution time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFilter {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub window: TimeWindow,
}

impl ResolvedFilter {
    pub fn new(query: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            query: query.into(),
            window,
        }
    }

    pub fn matches(&self, report: &Report, now: Timestamp, offset: FixedOffset) -> bool {
        let query = self.query.trim().to_lowercase();
        if !query.is_empty() && !report.name.as_str().to_lowercase().contains(&query) {
            return false;
        }
        match (self.window, report.resolved_at()) {
            (TimeWindow::All, _) => true,
            (window, Some(at)) => window.contains(at, now, offset),
            (_, None) => false,
        }
    }

    pub fn apply(&self, reports: &[Report], now: Timestamp, offset: FixedOffset) -> Vec<Report> {
        reports
            .iter()
            .filter(|report| self.matches(report, now, offset))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dispatch_core::{ReportKind, ReportName, ReportState};

    fn manila() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn resolved(name: &str, at: Timestamp) -> Report {
        Report {
            name: ReportName::new(name),
            kind: ReportKind::Complaint,
            category: "Noise".to_string(),
            address: "Marikina".to_string(),
            description: String::new(),
            location: None,
            media_url: None,
            state: ReportState::Resolved {
                code: None,
                confirmed_at: None,
                resolved_at: at,
                resolved_by: "Pedro".to_string(),
            },
        }
    }

    #[test]
    fn query_is_case_insensitive_substring() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 4, 0, 0).unwrap();
        let reports = vec![
            resolved("Juan Dela Cruz", now),
            resolved("Maria Clara", now),
        ];
        let filter = ResolvedFilter::new("dela", TimeWindow::All);
        let found = filter.apply(&reports, now, manila());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_str(), "Juan Dela Cruz");

        assert_eq!(ResolvedFilter::default().apply(&reports, now, manila()).len(), 2);
    }

    #[test]
    fn day_window_follows_the_local_calendar() {
        // 2024-05-10 12:00 in Manila
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 4, 0, 0).unwrap();
        // 2024-05-10 00:30 local, still the previous day in UTC
        let early = resolved("early", Utc.with_ymd_and_hms(2024, 5, 9, 16, 30, 0).unwrap());
        // 2024-05-09 23:59 local
        let late = resolved("late", Utc.with_ymd_and_hms(2024, 5, 9, 15, 59, 0).unwrap());

        let day = ResolvedFilter::new("", TimeWindow::Day);
        assert!(day.matches(&early, now, manila()));
        assert!(!day.matches(&late, now, manila()));

        let month = ResolvedFilter::new("", TimeWindow::Month);
        assert!(month.matches(&late, now, manila()));

        let last_year = resolved("old", Utc.with_ymd_and_hms(2023, 12, 31, 15, 59, 0).unwrap());
        let year = ResolvedFilter::new("", TimeWindow::Year);
        assert!(!year.matches(&last_year, now, manila()));
    }
}
