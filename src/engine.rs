//! Report boundary: parameter validation, cache read-through, batched
//! fetching and the hand-off to the pure reporters. Each entry point is
//! stateless across calls and safe to invoke concurrently.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{self, ReportCache};
use crate::db::LearningStore;
use crate::error::{AnalyticsError, Result};
use crate::models::{CourseRecord, InstructorReport, PlatformReport, StudentReport};
use crate::platform::{self, PlatformInputs};
use crate::{instructor, student};

/// Matches the upstream controller's 10-minute report TTL.
const CACHE_TTL_SECS: u64 = 600;

/// Candidate pool size for tag-matched recommendations.
const RECOMMENDATION_CANDIDATES: i64 = 50;

const MAX_WINDOW_DAYS: u32 = 365;

pub struct AnalyticsEngine<S> {
    store: S,
    cache: Box<dyn ReportCache>,
}

impl<S: LearningStore> AnalyticsEngine<S> {
    pub fn new(store: S, cache: Box<dyn ReportCache>) -> Self {
        Self { store, cache }
    }

    pub async fn instructor_performance(&self, instructor_id: &str) -> Result<InstructorReport> {
        let instructor_id = parse_id(instructor_id, "instructor id")?;
        let key = cache::instructor_key(&instructor_id);
        if let Some(report) = self.cache_get(&key).await {
            return Ok(report);
        }

        let courses = self.store.courses_by_instructor(instructor_id).await?;
        let course_ids: Vec<Uuid> = courses.iter().map(|c| c.id).collect();
        let enrollments = self.store.enrollments_by_course_ids(&course_ids).await?;
        let reviews = self.store.reviews_by_course_ids(&course_ids).await?;

        let report = instructor::build_instructor_report(
            instructor_id,
            &courses,
            &enrollments,
            &reviews,
            Utc::now(),
        );
        self.cache_put(&key, &report).await;
        Ok(report)
    }

    pub async fn student_analytics(&self, user_id: &str) -> Result<StudentReport> {
        let user_id = parse_id(user_id, "user id")?;
        let key = cache::student_key(&user_id);
        if let Some(report) = self.cache_get(&key).await {
            return Ok(report);
        }

        if !self.store.user_exists(user_id).await? {
            return Err(AnalyticsError::NotFound(format!("user {user_id}")));
        }

        let enrollments = self.store.enrollments_by_user(user_id).await?;

        // Course metadata for quiz-scored enrollments is fetched in one batch
        // keyed by the distinct id set, never one query per enrollment.
        let quiz_course_ids: Vec<Uuid> = enrollments
            .iter()
            .filter(|e| !e.quiz_scores.is_empty())
            .map(|e| e.course_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let course_map: HashMap<Uuid, CourseRecord> = self
            .store
            .courses_by_ids(&quiz_course_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let outcomes = student::quiz_outcomes(&enrollments, &course_map);
        let candidates = if outcomes.is_empty() {
            Vec::new()
        } else {
            let mut tags: Vec<String> =
                student::tag_frequency(&outcomes).into_keys().collect();
            tags.sort();
            self.store
                .courses_by_tags(&tags, RECOMMENDATION_CANDIDATES)
                .await?
        };

        let report = student::build_student_report(
            user_id,
            &enrollments,
            &outcomes,
            &candidates,
            Utc::now(),
        );
        self.cache_put(&key, &report).await;
        Ok(report)
    }

    pub async fn platform_overview(&self, window_days: u32) -> Result<PlatformReport> {
        if window_days == 0 || window_days > MAX_WINDOW_DAYS {
            return Err(AnalyticsError::Validation(format!(
                "window_days must be between 1 and {MAX_WINDOW_DAYS}, got {window_days}"
            )));
        }
        let key = cache::platform_key(window_days);
        if let Some(report) = self.cache_get(&key).await {
            return Ok(report);
        }

        let now = Utc::now();
        let since = now - Duration::days(i64::from(window_days));

        let total_users = self.store.count_users(None).await?;
        let new_users = self.store.count_users(Some(since)).await?;
        let total_courses = self.store.count_courses().await?;
        let new_enrollments = self.store.count_enrollments(Some(since)).await?;
        let window_enrollments = self.store.enrollments_since(since).await?;

        let window_course_ids: Vec<Uuid> = window_enrollments
            .iter()
            .map(|e| e.course_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let course_prices: HashMap<Uuid, f64> = self
            .store
            .courses_by_ids(&window_course_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c.price))
            .collect();

        let inputs = PlatformInputs {
            total_users,
            new_users,
            total_courses,
            new_enrollments,
            window_enrollments,
            course_prices,
            per_user_enrollment_counts: self.store.enrollment_counts_per_user().await?,
            device_totals: self.store.device_totals().await?,
        };

        let report = platform::build_platform_report(window_days, now, &inputs);
        self.cache_put(&key, &report).await;
        Ok(report)
    }

    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(report) => {
                    debug!(key, "serving report from cache");
                    Some(report)
                }
                Err(err) => {
                    warn!(key, %err, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key, %err, "cache read failed, computing report");
                None
            }
        }
    }

    async fn cache_put<T: Serialize>(&self, key: &str, report: &T) {
        match serde_json::to_string(report) {
            Ok(raw) => {
                if let Err(err) = self.cache.set(key, &raw, CACHE_TTL_SECS).await {
                    warn!(key, %err, "cache write failed, report still served");
                }
            }
            Err(err) => warn!(key, %err, "report not cacheable"),
        }
    }
}

fn parse_id(raw: &str, label: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| AnalyticsError::Validation(format!("{label} must be a UUID, got {raw:?}")))
}
