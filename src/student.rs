//! Per-student learning analytics: completion-state classification,
//! engagement streaks, quiz performance by category and tag-based course
//! recommendations.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::metrics::{clamp_percent, grouped_average, mean};
use crate::models::{
    CourseRecord, EnrollmentRecord, LearningStats, PerformanceMetrics, Recommendation,
    StudentReport,
};

/// A non-completed enrollment untouched for longer than this counts as
/// abandoned.
pub const ABANDON_AFTER_DAYS: i64 = 60;

/// Rating factor fallback for candidate courses that were never rated.
pub const DEFAULT_CANDIDATE_RATING: f64 = 4.0;

pub const MAX_RECOMMENDATIONS: usize = 10;
const CATEGORY_LIST_LEN: usize = 3;

/// Mutually exclusive completion states; classification is a true partition
/// of the enrollment set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentState {
    Completed,
    InProgress,
    Abandoned,
}

pub fn classify(enrollment: &EnrollmentRecord, now: DateTime<Utc>) -> EnrollmentState {
    if enrollment.is_completed() {
        EnrollmentState::Completed
    } else if now - enrollment.last_activity() > Duration::days(ABANDON_AFTER_DAYS) {
        EnrollmentState::Abandoned
    } else {
        EnrollmentState::InProgress
    }
}

/// Mean days from enrollment to last access over completed enrollments that
/// carry both timestamps; 0 when none do.
pub fn average_completion_days(enrollments: &[EnrollmentRecord]) -> f64 {
    let days: Vec<f64> = enrollments
        .iter()
        .filter(|e| e.is_completed())
        .filter_map(|e| {
            e.last_accessed
                .map(|last| (last - e.enrolled_at).num_seconds() as f64 / 86_400.0)
        })
        .collect();
    mean(&days)
}

/// Longest run of consecutive calendar days with activity on any enrollment.
/// Day-granular by construction: several courses touched on one day count as
/// a single activity day.
pub fn longest_streak_days(enrollments: &[EnrollmentRecord]) -> u32 {
    let days: BTreeSet<NaiveDate> = enrollments
        .iter()
        .filter_map(|e| e.last_accessed)
        .map(|t| t.date_naive())
        .collect();

    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous {
            Some(prev) if (day - prev).num_days() == 1 => run + 1,
            _ => 1,
        };
        previous = Some(day);
        longest = longest.max(run);
    }
    longest
}

/// One quiz-scored enrollment flattened to its course's category and tags.
#[derive(Debug, Clone)]
pub struct QuizOutcome {
    pub course_id: Uuid,
    pub category: String,
    pub score: f64,
    pub tags: Vec<String>,
}

pub fn quiz_outcomes(
    enrollments: &[EnrollmentRecord],
    courses: &HashMap<Uuid, CourseRecord>,
) -> Vec<QuizOutcome> {
    enrollments
        .iter()
        .filter(|e| !e.quiz_scores.is_empty())
        .map(|e| {
            let clamped: Vec<f64> = e.quiz_scores.iter().copied().map(clamp_percent).collect();
            let (category, tags) = match courses.get(&e.course_id) {
                Some(course) => (
                    course
                        .category
                        .clone()
                        .unwrap_or_else(|| "uncategorized".to_string()),
                    course.tags.clone(),
                ),
                None => ("uncategorized".to_string(), Vec::new()),
            };
            QuizOutcome {
                course_id: e.course_id,
                category,
                score: mean(&clamped),
                tags,
            }
        })
        .collect()
}

pub fn average_quiz_score(outcomes: &[QuizOutcome]) -> f64 {
    let scores: Vec<f64> = outcomes.iter().map(|o| o.score).collect();
    mean(&scores)
}

/// Top and bottom categories by average quiz score. With five or fewer
/// distinct categories the two lists overlap; that is expected, not a bug.
pub fn category_strength(outcomes: &[QuizOutcome]) -> (Vec<String>, Vec<String>) {
    let averages = grouped_average(outcomes, |o| o.category.clone(), |o| o.score);
    let mut ranked: Vec<(String, f64)> = averages.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let strong = ranked
        .iter()
        .take(CATEGORY_LIST_LEN)
        .map(|(category, _)| category.clone())
        .collect();
    let weak = ranked[ranked.len().saturating_sub(CATEGORY_LIST_LEN)..]
        .iter()
        .map(|(category, _)| category.clone())
        .collect();
    (strong, weak)
}

/// Tags seen across the student's quiz-scored enrollments, with counts.
pub fn tag_frequency(outcomes: &[QuizOutcome]) -> HashMap<String, usize> {
    let mut frequency = HashMap::new();
    for outcome in outcomes {
        for tag in &outcome.tags {
            *frequency.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    frequency
}

/// Scores candidate courses against the student's tag profile. Candidates the
/// student already enrolled in are excluded here explicitly; the tag
/// intersection query alone does not guarantee it.
pub fn score_recommendations(
    candidates: &[CourseRecord],
    tags: &HashMap<String, usize>,
    average_quiz: f64,
    enrolled_course_ids: &HashSet<Uuid>,
) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = candidates
        .iter()
        .filter(|c| !enrolled_course_ids.contains(&c.id))
        .filter_map(|c| {
            let matching = c.tags.iter().filter(|t| tags.contains_key(*t)).count();
            if matching == 0 {
                return None;
            }
            let rating_factor =
                c.stats.average_rating.unwrap_or(DEFAULT_CANDIDATE_RATING) / 5.0;
            let match_score = matching as f64 * (average_quiz / 100.0) * (1.0 + rating_factor);
            Some(Recommendation {
                course_id: c.id,
                course_name: c.title.clone(),
                match_score,
                reason: format!("{matching} matching tags"),
            })
        })
        .collect();

    recommendations.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.course_name.cmp(&b.course_name))
    });
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}

pub fn build_student_report(
    student_id: Uuid,
    enrollments: &[EnrollmentRecord],
    outcomes: &[QuizOutcome],
    candidates: &[CourseRecord],
    now: DateTime<Utc>,
) -> StudentReport {
    let mut completed = 0;
    let mut in_progress = 0;
    let mut abandoned = 0;
    for enrollment in enrollments {
        match classify(enrollment, now) {
            EnrollmentState::Completed => completed += 1,
            EnrollmentState::InProgress => in_progress += 1,
            EnrollmentState::Abandoned => abandoned += 1,
        }
    }

    let average_quiz = average_quiz_score(outcomes);
    let (strong_categories, weak_categories) = category_strength(outcomes);

    let enrolled_course_ids: HashSet<Uuid> =
        enrollments.iter().map(|e| e.course_id).collect();
    let recommendations = score_recommendations(
        candidates,
        &tag_frequency(outcomes),
        average_quiz,
        &enrolled_course_ids,
    );

    StudentReport {
        student_id,
        learning_stats: LearningStats {
            total_courses_enrolled: enrollments.len(),
            courses_completed: completed,
            courses_in_progress: in_progress,
            courses_abandoned: abandoned,
            average_completion_time_days: average_completion_days(enrollments),
            total_hours_learned: enrollments.iter().map(|e| e.total_time_spent_hours).sum(),
            streak_days: longest_streak_days(enrollments),
        },
        performance_metrics: PerformanceMetrics {
            average_quiz_score: average_quiz,
            strong_categories,
            weak_categories,
            improvement_rate: None,
        },
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotStats;
    use chrono::TimeZone;

    fn enrollment(
        progress: f64,
        enrolled_days_ago: i64,
        accessed_days_ago: Option<i64>,
    ) -> EnrollmentRecord {
        let now = Utc::now();
        EnrollmentRecord {
            user_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            progress_percent: progress,
            enrolled_at: now - Duration::days(enrolled_days_ago),
            last_accessed: accessed_days_ago.map(|d| now - Duration::days(d)),
            total_time_spent_hours: 5.0,
            quiz_scores: vec![],
        }
    }

    fn tagged_course(title: &str, tags: &[&str], rating: Option<f64>) -> CourseRecord {
        CourseRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            price: 0.0,
            category: Some("programming".to_string()),
            level: None,
            instructor_id: Uuid::new_v4(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            stats: SnapshotStats {
                average_rating: rating,
                ..SnapshotStats::default()
            },
        }
    }

    #[test]
    fn classification_is_a_partition() {
        let now = Utc::now();
        let enrollments = vec![
            enrollment(95.0, 100, Some(1)),
            enrollment(80.0, 100, None),
            enrollment(50.0, 100, Some(5)),
            enrollment(10.0, 100, Some(75)),
            enrollment(0.0, 200, None),
        ];

        let report =
            build_student_report(Uuid::new_v4(), &enrollments, &[], &[], now);
        let stats = &report.learning_stats;
        assert_eq!(
            stats.courses_completed + stats.courses_in_progress + stats.courses_abandoned,
            stats.total_courses_enrolled
        );
        assert_eq!(stats.courses_completed, 2);
        assert_eq!(stats.courses_abandoned, 2);
        assert_eq!(stats.courses_in_progress, 1);
    }

    #[test]
    fn abandonment_requires_strictly_more_than_sixty_days() {
        let now = Utc::now();
        let on_boundary = enrollment(30.0, 120, Some(60));
        let over_boundary = enrollment(30.0, 120, Some(61));
        assert_eq!(classify(&on_boundary, now), EnrollmentState::InProgress);
        assert_eq!(classify(&over_boundary, now), EnrollmentState::Abandoned);
    }

    #[test]
    fn never_accessed_enrollment_ages_from_enrollment_date() {
        let now = Utc::now();
        let stale = enrollment(10.0, 90, None);
        assert_eq!(classify(&stale, now), EnrollmentState::Abandoned);
        let fresh = enrollment(10.0, 10, None);
        assert_eq!(classify(&fresh, now), EnrollmentState::InProgress);
    }

    #[test]
    fn streak_counts_longest_consecutive_day_run() {
        let days = [
            (2024, 1, 1),
            (2024, 1, 2),
            (2024, 1, 3),
            (2024, 1, 10),
        ];
        let enrollments: Vec<EnrollmentRecord> = days
            .iter()
            .map(|&(y, m, d)| {
                let mut e = enrollment(50.0, 400, None);
                e.last_accessed = Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap());
                e
            })
            .collect();

        assert_eq!(longest_streak_days(&enrollments), 3);
    }

    #[test]
    fn streak_deduplicates_same_day_activity() {
        let mut a = enrollment(50.0, 400, None);
        let mut b = enrollment(50.0, 400, None);
        a.last_accessed = Some(Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap());
        b.last_accessed = Some(Utc.with_ymd_and_hms(2024, 3, 5, 21, 0, 0).unwrap());
        assert_eq!(longest_streak_days(&[a, b]), 1);
    }

    #[test]
    fn completion_time_averages_completed_with_both_timestamps() {
        let mut done_in_ten = enrollment(90.0, 30, Some(20));
        done_in_ten.last_accessed = Some(done_in_ten.enrolled_at + Duration::days(10));
        let mut done_in_twenty = enrollment(85.0, 40, None);
        done_in_twenty.last_accessed = Some(done_in_twenty.enrolled_at + Duration::days(20));
        let unfinished = enrollment(30.0, 40, Some(1));
        let done_without_access = enrollment(95.0, 40, None);

        let avg = average_completion_days(&[
            done_in_ten,
            done_in_twenty,
            unfinished,
            done_without_access,
        ]);
        assert!((avg - 15.0).abs() < 1e-6);
    }

    #[test]
    fn quiz_scores_clamped_and_averaged_per_enrollment() {
        let course = tagged_course("Rust", &["rust"], None);
        let mut e = enrollment(50.0, 10, Some(1));
        e.course_id = course.id;
        e.quiz_scores = vec![120.0, 80.0]; // 120 clamps to 100
        let courses = HashMap::from([(course.id, course)]);

        let outcomes = quiz_outcomes(&[e], &courses);
        assert_eq!(outcomes.len(), 1);
        assert!((outcomes[0].score - 90.0).abs() < 1e-9);
        assert_eq!(outcomes[0].category, "programming");
    }

    #[test]
    fn no_quiz_scores_means_zero_average_and_no_recommendations() {
        let enrollments = vec![enrollment(50.0, 10, Some(1))];
        let candidates = vec![tagged_course("Candidate", &["rust"], None)];
        let report =
            build_student_report(Uuid::new_v4(), &enrollments, &[], &candidates, Utc::now());
        assert_eq!(report.performance_metrics.average_quiz_score, 0.0);
        assert!(report.recommendations.is_empty());
        assert_eq!(report.performance_metrics.improvement_rate, None);
    }

    #[test]
    fn strong_and_weak_categories_overlap_when_few_categories() {
        let outcomes = vec![
            QuizOutcome {
                course_id: Uuid::new_v4(),
                category: "databases".to_string(),
                score: 90.0,
                tags: vec![],
            },
            QuizOutcome {
                course_id: Uuid::new_v4(),
                category: "networking".to_string(),
                score: 60.0,
                tags: vec![],
            },
        ];

        let (strong, weak) = category_strength(&outcomes);
        assert_eq!(strong, vec!["databases", "networking"]);
        assert_eq!(weak, vec!["databases", "networking"]);
    }

    #[test]
    fn recommendations_exclude_enrolled_and_rank_by_score() {
        let enrolled = tagged_course("Already Taken", &["rust", "async"], Some(5.0));
        let strong_match = tagged_course("Two Tags", &["rust", "async"], Some(5.0));
        let weak_match = tagged_course("One Tag", &["rust"], Some(5.0));
        let unrelated = tagged_course("Unrelated", &["pottery"], Some(5.0));

        let tags = HashMap::from([("rust".to_string(), 2), ("async".to_string(), 1)]);
        let enrolled_ids = HashSet::from([enrolled.id]);
        let candidates = vec![enrolled.clone(), weak_match, strong_match, unrelated];

        let recommendations = score_recommendations(&candidates, &tags, 80.0, &enrolled_ids);

        assert_eq!(recommendations.len(), 2);
        assert_eq!(recommendations[0].course_name, "Two Tags");
        assert_eq!(recommendations[0].reason, "2 matching tags");
        assert!(recommendations[0].match_score > recommendations[1].match_score);
        assert!(recommendations.iter().all(|r| r.course_id != enrolled.id));
    }

    #[test]
    fn unrated_candidates_use_default_rating_factor() {
        let candidate = tagged_course("Unrated", &["rust"], None);
        let tags = HashMap::from([("rust".to_string(), 1)]);
        let recommendations =
            score_recommendations(&[candidate], &tags, 100.0, &HashSet::new());
        // 1 tag * (100/100) * (1 + 4/5)
        assert!((recommendations[0].match_score - 1.8).abs() < 1e-9);
    }

    #[test]
    fn recommendation_list_capped_at_ten() {
        let tags = HashMap::from([("rust".to_string(), 1)]);
        let candidates: Vec<CourseRecord> = (0..15)
            .map(|i| tagged_course(&format!("Course {i}"), &["rust"], Some(4.0)))
            .collect();
        let recommendations =
            score_recommendations(&candidates, &tags, 75.0, &HashSet::new());
        assert_eq!(recommendations.len(), MAX_RECOMMENDATIONS);
    }
}
