//! Instructor performance reporting: joins an instructor's courses with
//! enrollment and review aggregates, then rolls the portfolio up.
//!
//! Enrollment aggregates are computed once over the fetched set and joined by
//! course id, bounding cost to O(enrollments) + O(courses) instead of
//! re-scanning per course.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::metrics::{clamp_percent, grouped_average, grouped_count, mean, safe_ratio};
use crate::models::{
    CoursePerformance, CourseRecord, EnrollmentRecord, InstructorReport, ReviewRecord,
    SnapshotStats, StudentEngagement, Trending,
};

/// An enrollment counts as "active" if its last access falls within this
/// trailing window.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Default)]
pub struct EnrollmentAggregate {
    pub total: i64,
    pub completed: i64,
    pub active_last_30: i64,
    pub average_progress: f64,
    pub average_time_spent: f64,
}

#[derive(Debug, Clone)]
pub struct ReviewAggregate {
    pub average_rating: f64,
    pub count: i64,
}

/// Per-course resolution of the live-vs-snapshot precedence: live aggregates
/// are authoritative, the denormalized snapshot is only a fallback for
/// courses with no live enrollment rows.
enum CourseSource<'a> {
    Live(&'a EnrollmentAggregate),
    Snapshot(&'a SnapshotStats),
}

pub fn aggregate_enrollments(
    enrollments: &[EnrollmentRecord],
    now: DateTime<Utc>,
) -> HashMap<Uuid, EnrollmentAggregate> {
    let active_cutoff = now - Duration::days(ACTIVE_WINDOW_DAYS);
    let mut acc: HashMap<Uuid, (i64, i64, i64, f64, f64)> = HashMap::new();

    for enrollment in enrollments {
        let entry = acc.entry(enrollment.course_id).or_default();
        entry.0 += 1;
        if enrollment.is_completed() {
            entry.1 += 1;
        }
        if enrollment.last_accessed.is_some_and(|t| t >= active_cutoff) {
            entry.2 += 1;
        }
        entry.3 += clamp_percent(enrollment.progress_percent);
        entry.4 += enrollment.total_time_spent_hours;
    }

    acc.into_iter()
        .map(|(course_id, (total, completed, active, progress_sum, time_sum))| {
            (
                course_id,
                EnrollmentAggregate {
                    total,
                    completed,
                    active_last_30: active,
                    average_progress: progress_sum / total as f64,
                    average_time_spent: time_sum / total as f64,
                },
            )
        })
        .collect()
}

pub fn aggregate_reviews(reviews: &[ReviewRecord]) -> HashMap<Uuid, ReviewAggregate> {
    let counts = grouped_count(reviews, |r| r.course_id);
    grouped_average(reviews, |r| r.course_id, |r| f64::from(r.rating))
        .into_iter()
        .map(|(course_id, average_rating)| {
            (
                course_id,
                ReviewAggregate {
                    average_rating,
                    count: counts[&course_id] as i64,
                },
            )
        })
        .collect()
}

pub fn build_instructor_report(
    instructor_id: Uuid,
    courses: &[CourseRecord],
    enrollments: &[EnrollmentRecord],
    reviews: &[ReviewRecord],
    now: DateTime<Utc>,
) -> InstructorReport {
    let enrollment_aggregates = aggregate_enrollments(enrollments, now);
    let review_aggregates = aggregate_reviews(reviews);

    let mut total_students = 0i64;
    let mut total_revenue = 0.0f64;
    let mut active_students = 0i64;
    let mut course_ratings = Vec::new();
    let mut course_time_means = Vec::new();
    let mut course_breakdown = Vec::with_capacity(courses.len());

    for course in courses {
        let source = match enrollment_aggregates.get(&course.id) {
            Some(live) => CourseSource::Live(live),
            None => CourseSource::Snapshot(&course.stats),
        };

        // The snapshot carries no completion or recent-activity breakdown, so
        // those resolve to zero when falling back.
        let (enrolled, completed, active, average_progress, time_spent) = match source {
            CourseSource::Live(agg) => (
                agg.total,
                agg.completed,
                agg.active_last_30,
                agg.average_progress,
                agg.average_time_spent,
            ),
            CourseSource::Snapshot(snap) => (snap.total_enrollments, 0, 0, 0.0, snap.average_duration),
        };

        let (rating, review_count) = match review_aggregates.get(&course.id) {
            Some(agg) => (Some(agg.average_rating), agg.count),
            None => (course.stats.average_rating, course.stats.total_reviews),
        };

        let revenue = course.price * enrolled as f64;
        total_students += enrolled;
        total_revenue += revenue;
        active_students += active;
        if let Some(rating) = rating {
            course_ratings.push(rating);
        }
        course_time_means.push(time_spent);

        course_breakdown.push(CoursePerformance {
            course_id: course.id,
            course_name: course.title.clone(),
            enrollments: enrolled,
            completion_rate: safe_ratio(completed as f64, enrolled as f64),
            average_progress,
            rating,
            review_count,
            revenue,
            active_last_30: active,
        });
    }

    let average_rating = if course_ratings.is_empty() {
        None
    } else {
        Some(mean(&course_ratings))
    };

    let trending = Trending {
        top_performing_course: argmax_by(&course_breakdown, |c| c.enrollments)
            .map(|c| c.course_name.clone()),
        fastest_growing_course: argmax_by(&course_breakdown, |c| c.active_last_30)
            .map(|c| c.course_name.clone()),
    };

    InstructorReport {
        instructor_id,
        total_courses: courses.len(),
        total_students,
        average_rating,
        total_revenue,
        student_engagement: StudentEngagement {
            active_students,
            inactive_students: (total_students - active_students).max(0),
            // Unweighted mean of per-course means, a documented approximation
            // rather than a student-weighted average.
            average_time_spent_hours: mean(&course_time_means),
        },
        trending,
        course_breakdown,
    }
}

/// First occurrence wins on ties, so trending picks are stable in input order.
fn argmax_by<F>(courses: &[CoursePerformance], metric: F) -> Option<&CoursePerformance>
where
    F: Fn(&CoursePerformance) -> i64,
{
    let mut best: Option<&CoursePerformance> = None;
    for course in courses {
        if best.map_or(true, |b| metric(course) > metric(b)) {
            best = Some(course);
        }
    }
    best
}
