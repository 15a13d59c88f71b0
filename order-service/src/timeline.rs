use serde::Serialize;
use shared::{OrderStatus, StatusInterval};
use std::collections::BTreeMap;

pub const ZERO_DURATION: &str = "00:00:00";

/// Per-status elapsed time of an order plus the mean over closed intervals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub durations: BTreeMap<OrderStatus, String>,
    pub average: String,
}

impl Timeline {
    pub fn empty() -> Self {
        Self {
            durations: BTreeMap::new(),
            average: ZERO_DURATION.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn get(&self, status: OrderStatus) -> Option<&str> {
        self.durations.get(&status).map(String::as_str)
    }
}

/// `HH:MM:SS`; hours keep counting past 24.
pub fn format_hms(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Builds the timeline from history rows ordered by `started_at`.
///
/// Closed rows contribute their full length, summed when a status was
/// visited more than once. Open rows show as zero. Without a single closed
/// row the timeline is empty.
pub fn build_timeline(history: &[StatusInterval]) -> Timeline {
    let mut seconds_by_status: BTreeMap<OrderStatus, i64> = BTreeMap::new();
    let mut closed_total: i64 = 0;
    let mut closed_count: i64 = 0;

    for row in history {
        let elapsed = match row.ended_at {
            Some(ended_at) => {
                let seconds = (ended_at - row.started_at).num_seconds().max(0);
                closed_total += seconds;
                closed_count += 1;
                seconds
            }
            None => 0,
        };
        *seconds_by_status.entry(row.status).or_insert(0) += elapsed;
    }

    if closed_count == 0 {
        return Timeline::empty();
    }

    Timeline {
        durations: seconds_by_status
            .into_iter()
            .map(|(status, seconds)| (status, format_hms(seconds)))
            .collect(),
        average: format_hms(closed_total / closed_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn row(status: OrderStatus, from: i64, to: Option<i64>) -> StatusInterval {
        StatusInterval {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            status,
            started_at: start() + Duration::seconds(from),
            ended_at: to.map(|to| start() + Duration::seconds(to)),
            duration_minutes: to.map(|to| (to - from) / 60),
        }
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(5400), "01:30:00");
        assert_eq!(format_hms(3661), "01:01:01");
        assert_eq!(format_hms(-5), "00:00:00");
    }

    #[test]
    fn test_format_hms_overflows_past_a_day() {
        assert_eq!(format_hms(100 * 3600 + 59), "100:00:59");
        assert_eq!(format_hms(26 * 3600), "26:00:00");
    }

    #[test]
    fn test_closed_and_open_rows() {
        let history = vec![
            row(OrderStatus::Received, 0, Some(5400)),
            row(OrderStatus::InProgress, 5400, None),
        ];

        let timeline = build_timeline(&history);

        assert_eq!(timeline.get(OrderStatus::Received), Some("01:30:00"));
        assert_eq!(timeline.get(OrderStatus::InProgress), Some("00:00:00"));
        assert_eq!(timeline.average, "01:30:00");
    }

    #[test]
    fn test_average_uses_only_closed_rows() {
        let history = vec![
            row(OrderStatus::Received, 0, Some(600)),
            row(OrderStatus::InDiagnosis, 600, Some(2400)),
            row(OrderStatus::InProgress, 2400, None),
        ];

        let timeline = build_timeline(&history);

        // (600 + 1800) / 2
        assert_eq!(timeline.average, "00:20:00");
        assert_eq!(timeline.durations.len(), 3);
    }

    #[test]
    fn test_revisited_status_is_summed() {
        let history = vec![
            row(OrderStatus::InProgress, 0, Some(600)),
            row(OrderStatus::AwaitingApproval, 600, Some(1200)),
            row(OrderStatus::InProgress, 1200, Some(2400)),
            row(OrderStatus::Completed, 2400, None),
        ];

        let timeline = build_timeline(&history);

        assert_eq!(timeline.get(OrderStatus::InProgress), Some("00:30:00"));
        assert_eq!(timeline.get(OrderStatus::AwaitingApproval), Some("00:10:00"));
        // (600 + 600 + 1200) / 3
        assert_eq!(timeline.average, "00:13:20");
    }

    #[test]
    fn test_only_open_row_gives_empty_timeline() {
        let timeline = build_timeline(&[row(OrderStatus::Received, 0, None)]);
        assert_eq!(timeline, Timeline::empty());
    }

    #[test]
    fn test_no_rows_gives_empty_timeline() {
        let timeline = build_timeline(&[]);
        assert!(timeline.is_empty());
        assert_eq!(timeline.average, ZERO_DURATION);
    }
}
