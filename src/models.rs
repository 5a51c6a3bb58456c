use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Completion cutoff: an enrollment at or above this progress counts as done.
pub const COMPLETION_THRESHOLD_PERCENT: f64 = 80.0;

/// Denormalized aggregate snapshot stored on the course row. Possibly stale;
/// consulted only when no live enrollment/review rows exist for the course.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStats {
    pub total_enrollments: i64,
    pub average_rating: Option<f64>,
    pub total_reviews: i64,
    pub completion_rate: f64,
    pub average_duration: f64,
}

#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub category: Option<String>,
    pub level: Option<String>,
    pub instructor_id: Uuid,
    pub tags: Vec<String>,
    pub stats: SnapshotStats,
}

#[derive(Debug, Clone)]
pub struct EnrollmentRecord {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub progress_percent: f64,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub total_time_spent_hours: f64,
    pub quiz_scores: Vec<f64>,
}

impl EnrollmentRecord {
    pub fn is_completed(&self) -> bool {
        crate::metrics::clamp_percent(self.progress_percent) >= COMPLETION_THRESHOLD_PERCENT
    }

    /// Most recent activity, falling back to the enrollment date when the
    /// course was never opened after enrolling.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_accessed.unwrap_or(self.enrolled_at).max(self.enrolled_at)
    }
}

#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTotals {
    pub mobile: i64,
    pub desktop: i64,
    pub tablet: i64,
}

// Report types below are transient query results with no persisted identity.
// They derive Serialize + Deserialize because serde_json is the cache wire
// format, and PartialEq so tests can compare whole reports.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursePerformance {
    pub course_id: Uuid,
    pub course_name: String,
    pub enrollments: i64,
    pub completion_rate: f64,
    pub average_progress: f64,
    /// Absent when the course has neither live reviews nor a snapshot rating.
    pub rating: Option<f64>,
    pub review_count: i64,
    pub revenue: f64,
    pub active_last_30: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentEngagement {
    pub active_students: i64,
    /// total − active, floored at zero: the per-course activity counts can
    /// double-count a student enrolled in several courses.
    pub inactive_students: i64,
    pub average_time_spent_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trending {
    pub top_performing_course: Option<String>,
    pub fastest_growing_course: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructorReport {
    pub instructor_id: Uuid,
    pub total_courses: usize,
    pub total_students: i64,
    /// Mean over courses that have rating data; `None` when no course does.
    pub average_rating: Option<f64>,
    pub total_revenue: f64,
    pub course_breakdown: Vec<CoursePerformance>,
    pub student_engagement: StudentEngagement,
    pub trending: Trending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub total_courses_enrolled: usize,
    pub courses_completed: usize,
    pub courses_in_progress: usize,
    pub courses_abandoned: usize,
    pub average_completion_time_days: f64,
    pub total_hours_learned: f64,
    pub streak_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub average_quiz_score: f64,
    pub strong_categories: Vec<String>,
    pub weak_categories: Vec<String>,
    /// Needs timestamped quiz attempts, which the enrollment record does not
    /// carry; reported as unavailable rather than derived from unordered data.
    pub improvement_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub course_id: Uuid,
    pub course_name: String,
    pub match_score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentReport {
    pub student_id: Uuid,
    pub learning_stats: LearningStats,
    pub performance_metrics: PerformanceMetrics,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEnrollments {
    pub day: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCompletionRate {
    pub week_start: NaiveDate,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformCounts {
    pub total_users: i64,
    pub new_users: i64,
    pub total_courses: i64,
    pub new_enrollments: i64,
    /// Window enrollments joined against *current* course prices, not the
    /// price at enrollment time.
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformTrends {
    pub enrollments_by_day: Vec<DailyEnrollments>,
    /// Empty until true ISO-week bucketing is available; an empty series is
    /// preferred over a misleading partial one.
    pub completion_rate_by_week: Vec<WeeklyCompletionRate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBehavior {
    pub average_courses_per_user: f64,
    pub device_breakdown: DeviceTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformReport {
    pub window_days: u32,
    pub overview: PlatformCounts,
    pub trends: PlatformTrends,
    pub user_behavior: UserBehavior,
}
