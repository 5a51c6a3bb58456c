//! Markdown rendering for the three reports, used by the CLI's `--out` flag.

use std::fmt::Write;

use crate::models::{InstructorReport, PlatformReport, StudentReport};

pub fn render_instructor(report: &InstructorReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Instructor Performance Report");
    let _ = writeln!(output, "Instructor {}", report.instructor_id);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Portfolio");
    let _ = writeln!(output, "- Courses: {}", report.total_courses);
    let _ = writeln!(output, "- Students: {}", report.total_students);
    let _ = writeln!(output, "- Revenue: {:.2}", report.total_revenue);
    match report.average_rating {
        Some(rating) => {
            let _ = writeln!(output, "- Average rating: {rating:.2}");
        }
        None => {
            let _ = writeln!(output, "- Average rating: no rated courses");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Breakdown");
    if report.course_breakdown.is_empty() {
        let _ = writeln!(output, "No courses for this instructor.");
    } else {
        for course in &report.course_breakdown {
            let _ = writeln!(
                output,
                "- {}: {} enrolled, {:.0}% completion, {:.2} revenue, {} active in last 30 days",
                course.course_name,
                course.enrollments,
                course.completion_rate * 100.0,
                course.revenue,
                course.active_last_30
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Engagement");
    let engagement = &report.student_engagement;
    let _ = writeln!(output, "- Active students: {}", engagement.active_students);
    let _ = writeln!(output, "- Inactive students: {}", engagement.inactive_students);
    let _ = writeln!(
        output,
        "- Average time spent: {:.1}h",
        engagement.average_time_spent_hours
    );

    if let Some(name) = &report.trending.top_performing_course {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Trending");
        let _ = writeln!(output, "- Top performing: {name}");
        if let Some(name) = &report.trending.fastest_growing_course {
            let _ = writeln!(output, "- Fastest growing: {name}");
        }
    }

    output
}

pub fn render_student(report: &StudentReport) -> String {
    let mut output = String::new();
    let stats = &report.learning_stats;
    let metrics = &report.performance_metrics;

    let _ = writeln!(output, "# Student Learning Report");
    let _ = writeln!(output, "Student {}", report.student_id);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Learning Stats");
    let _ = writeln!(output, "- Enrolled: {}", stats.total_courses_enrolled);
    let _ = writeln!(
        output,
        "- Completed / in progress / abandoned: {} / {} / {}",
        stats.courses_completed, stats.courses_in_progress, stats.courses_abandoned
    );
    let _ = writeln!(
        output,
        "- Average completion time: {:.1} days",
        stats.average_completion_time_days
    );
    let _ = writeln!(output, "- Hours learned: {:.1}", stats.total_hours_learned);
    let _ = writeln!(output, "- Longest streak: {} days", stats.streak_days);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance");
    let _ = writeln!(output, "- Average quiz score: {:.1}", metrics.average_quiz_score);
    if !metrics.strong_categories.is_empty() {
        let _ = writeln!(output, "- Strong: {}", metrics.strong_categories.join(", "));
        let _ = writeln!(output, "- Weak: {}", metrics.weak_categories.join(", "));
    }
    if metrics.improvement_rate.is_none() {
        let _ = writeln!(output, "- Improvement rate: unavailable");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    if report.recommendations.is_empty() {
        let _ = writeln!(output, "No recommendations yet; quiz activity drives matching.");
    } else {
        for rec in &report.recommendations {
            let _ = writeln!(
                output,
                "- {} (score {:.2}, {})",
                rec.course_name, rec.match_score, rec.reason
            );
        }
    }

    output
}

pub fn render_platform(report: &PlatformReport) -> String {
    let mut output = String::new();
    let overview = &report.overview;
    let behavior = &report.user_behavior;

    let _ = writeln!(output, "# Platform Overview");
    let _ = writeln!(output, "Trailing {} days", report.window_days);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Users: {} ({} new)", overview.total_users, overview.new_users);
    let _ = writeln!(output, "- Courses: {}", overview.total_courses);
    let _ = writeln!(output, "- Enrollments in window: {}", overview.new_enrollments);
    let _ = writeln!(output, "- Revenue in window: {:.2}", overview.revenue);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Enrollments By Day");
    for bucket in &report.trends.enrollments_by_day {
        let _ = writeln!(output, "- {}: {}", bucket.day, bucket.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## User Behavior");
    let _ = writeln!(
        output,
        "- Average courses per enrolled user: {:.2}",
        behavior.average_courses_per_user
    );
    let devices = &behavior.device_breakdown;
    let _ = writeln!(
        output,
        "- Devices: {} mobile, {} desktop, {} tablet",
        devices.mobile, devices.desktop, devices.tablet
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use uuid::Uuid;

    #[test]
    fn empty_instructor_report_renders_placeholders() {
        let report = InstructorReport {
            instructor_id: Uuid::new_v4(),
            total_courses: 0,
            total_students: 0,
            average_rating: None,
            total_revenue: 0.0,
            course_breakdown: vec![],
            student_engagement: StudentEngagement {
                active_students: 0,
                inactive_students: 0,
                average_time_spent_hours: 0.0,
            },
            trending: Trending {
                top_performing_course: None,
                fastest_growing_course: None,
            },
        };

        let markdown = render_instructor(&report);
        assert!(markdown.contains("No courses for this instructor."));
        assert!(markdown.contains("no rated courses"));
        assert!(!markdown.contains("## Trending"));
    }
}
