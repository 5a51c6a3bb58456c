//! Platform-wide overview: counts, windowed revenue, a daily enrollment time
//! series and behavioral averages over a trailing window anchored to "now".

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::metrics::{grouped_count, window_filter};
use crate::models::{
    DailyEnrollments, DeviceTotals, EnrollmentRecord, PlatformCounts, PlatformReport,
    PlatformTrends, UserBehavior,
};

/// Everything the overview needs, pre-fetched so the computation stays pure.
#[derive(Debug, Clone, Default)]
pub struct PlatformInputs {
    pub total_users: i64,
    pub new_users: i64,
    pub total_courses: i64,
    pub new_enrollments: i64,
    /// Enrollments created inside the window.
    pub window_enrollments: Vec<EnrollmentRecord>,
    /// Current price per course referenced by a window enrollment.
    pub course_prices: HashMap<Uuid, f64>,
    /// One count per user with at least one enrollment; zero-enrollment users
    /// never appear here and so never dilute the average.
    pub per_user_enrollment_counts: Vec<i64>,
    pub device_totals: DeviceTotals,
}

pub fn build_platform_report(
    window_days: u32,
    now: DateTime<Utc>,
    inputs: &PlatformInputs,
) -> PlatformReport {
    // Window revenue joins each enrollment against the course's current
    // price; prices at enrollment time are not recorded.
    let revenue: f64 = inputs
        .window_enrollments
        .iter()
        .filter_map(|e| inputs.course_prices.get(&e.course_id))
        .sum();

    let counts = inputs.per_user_enrollment_counts.len();
    let average_courses_per_user = if counts == 0 {
        0.0
    } else {
        inputs.per_user_enrollment_counts.iter().sum::<i64>() as f64 / counts as f64
    };

    PlatformReport {
        window_days,
        overview: PlatformCounts {
            total_users: inputs.total_users,
            new_users: inputs.new_users,
            total_courses: inputs.total_courses,
            new_enrollments: inputs.new_enrollments,
            revenue,
        },
        trends: PlatformTrends {
            enrollments_by_day: daily_enrollment_series(
                &inputs.window_enrollments,
                window_days,
                now,
            ),
            // Needs true ISO-week bucketing; until then an empty series beats
            // a misleading partial one.
            completion_rate_by_week: Vec::new(),
        },
        user_behavior: UserBehavior {
            average_courses_per_user,
            device_breakdown: inputs.device_totals.clone(),
        },
    }
}

/// Calendar-day enrollment counts over the window, ascending, with gap days
/// filled as explicit zeros.
pub fn daily_enrollment_series(
    enrollments: &[EnrollmentRecord],
    window_days: u32,
    now: DateTime<Utc>,
) -> Vec<DailyEnrollments> {
    let since = now - Duration::days(i64::from(window_days));
    let in_window = window_filter(enrollments, |e| e.enrolled_at, since);
    let counts = grouped_count(&in_window, |e| e.enrolled_at.date_naive());

    let mut buckets: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    let mut day = since.date_naive();
    let end = now.date_naive();
    while day <= end {
        buckets.insert(day, counts.get(&day).map_or(0, |c| *c as i64));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    buckets
        .into_iter()
        .map(|(day, count)| DailyEnrollments { day, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_enrollment(course_id: Uuid, days_ago: i64) -> EnrollmentRecord {
        let now = Utc::now();
        EnrollmentRecord {
            user_id: Uuid::new_v4(),
            course_id,
            progress_percent: 0.0,
            enrolled_at: now - Duration::days(days_ago),
            last_accessed: None,
            total_time_spent_hours: 0.0,
            quiz_scores: vec![],
        }
    }

    #[test]
    fn daily_series_fills_gap_days_with_zero() {
        let course_id = Uuid::new_v4();
        let enrollments = vec![
            window_enrollment(course_id, 0),
            window_enrollment(course_id, 0),
            window_enrollment(course_id, 5),
        ];

        let series = daily_enrollment_series(&enrollments, 7, Utc::now());

        assert_eq!(series.len(), 8); // window start through today inclusive
        assert!(series.windows(2).all(|w| w[0].day < w[1].day));
        assert_eq!(series.last().unwrap().count, 2);
        assert_eq!(series.iter().map(|d| d.count).sum::<i64>(), 3);
        assert!(series.iter().any(|d| d.count == 0));
    }

    #[test]
    fn revenue_joins_current_course_price() {
        let cheap = Uuid::new_v4();
        let pricey = Uuid::new_v4();
        let inputs = PlatformInputs {
            window_enrollments: vec![
                window_enrollment(cheap, 1),
                window_enrollment(pricey, 2),
                window_enrollment(pricey, 3),
            ],
            course_prices: HashMap::from([(cheap, 10.0), (pricey, 100.0)]),
            ..PlatformInputs::default()
        };

        let report = build_platform_report(30, Utc::now(), &inputs);
        assert!((report.overview.revenue - 210.0).abs() < 1e-9);
    }

    #[test]
    fn average_courses_per_user_excludes_zero_enrollment_users() {
        // User A has 3 enrollments; user B has none and is simply absent
        // from the per-user counts.
        let inputs = PlatformInputs {
            total_users: 2,
            per_user_enrollment_counts: vec![3],
            ..PlatformInputs::default()
        };

        let report = build_platform_report(30, Utc::now(), &inputs);
        assert!((report.user_behavior.average_courses_per_user - 3.0).abs() < 1e-9);
    }

    #[test]
    fn no_enrolled_users_yields_zero_average() {
        let report = build_platform_report(30, Utc::now(), &PlatformInputs::default());
        assert_eq!(report.user_behavior.average_courses_per_user, 0.0);
    }

    #[test]
    fn weekly_completion_series_stays_empty() {
        let report = build_platform_report(30, Utc::now(), &PlatformInputs::default());
        assert!(report.trends.completion_rate_by_week.is_empty());
    }
}
