//! Data access layer: read-only queries over users, courses, enrollments and
//! reviews, behind the `LearningStore` trait so reporters can be exercised
//! against an in-memory store in tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{AnalyticsError, Result};
use crate::models::{CourseRecord, DeviceTotals, EnrollmentRecord, ReviewRecord, SnapshotStats};

#[async_trait]
pub trait LearningStore: Send + Sync {
    async fn courses_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<CourseRecord>>;
    async fn enrollments_by_course_ids(&self, course_ids: &[Uuid]) -> Result<Vec<EnrollmentRecord>>;
    async fn reviews_by_course_ids(&self, course_ids: &[Uuid]) -> Result<Vec<ReviewRecord>>;
    async fn enrollments_by_user(&self, user_id: Uuid) -> Result<Vec<EnrollmentRecord>>;
    async fn courses_by_ids(&self, course_ids: &[Uuid]) -> Result<Vec<CourseRecord>>;
    async fn courses_by_tags(&self, tags: &[String], limit: i64) -> Result<Vec<CourseRecord>>;
    async fn user_exists(&self, user_id: Uuid) -> Result<bool>;
    async fn count_users(&self, since: Option<DateTime<Utc>>) -> Result<i64>;
    async fn count_courses(&self) -> Result<i64>;
    async fn count_enrollments(&self, since: Option<DateTime<Utc>>) -> Result<i64>;
    async fn enrollments_since(&self, since: DateTime<Utc>) -> Result<Vec<EnrollmentRecord>>;
    /// One count per user with at least one enrollment.
    async fn enrollment_counts_per_user(&self) -> Result<Vec<i64>>;
    async fn device_totals(&self) -> Result<DeviceTotals>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COURSE_COLUMNS: &str = "id, title, price, category, level, instructor_id, tags, \
     stats_total_enrollments, stats_average_rating, stats_total_reviews, \
     stats_completion_rate, stats_average_duration";

// A column that fails to decode is a shape mismatch, not a storage outage,
// and surfaces as a computation error at the report boundary.
fn decode_error(entity: &str) -> impl Fn(sqlx::Error) -> AnalyticsError + '_ {
    move |err| AnalyticsError::Computation(format!("{entity} row decode failed: {err}"))
}

fn course_from_row(row: &PgRow) -> Result<CourseRecord> {
    let decode = |row: &PgRow| -> sqlx::Result<CourseRecord> {
        Ok(CourseRecord {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            price: row.try_get("price")?,
            category: row.try_get("category")?,
            level: row.try_get("level")?,
            instructor_id: row.try_get("instructor_id")?,
            tags: row.try_get("tags")?,
            stats: SnapshotStats {
                total_enrollments: row.try_get("stats_total_enrollments")?,
                average_rating: row.try_get("stats_average_rating")?,
                total_reviews: row.try_get("stats_total_reviews")?,
                completion_rate: row.try_get("stats_completion_rate")?,
                average_duration: row.try_get("stats_average_duration")?,
            },
        })
    };
    decode(row).map_err(decode_error("course"))
}

fn enrollment_from_row(row: &PgRow) -> Result<EnrollmentRecord> {
    let decode = |row: &PgRow| -> sqlx::Result<EnrollmentRecord> {
        Ok(EnrollmentRecord {
            user_id: row.try_get("user_id")?,
            course_id: row.try_get("course_id")?,
            progress_percent: row.try_get("progress_percent")?,
            enrolled_at: row.try_get("enrolled_at")?,
            last_accessed: row.try_get("last_accessed")?,
            total_time_spent_hours: row.try_get("total_time_spent_hours")?,
            quiz_scores: row.try_get("quiz_scores")?,
        })
    };
    decode(row).map_err(decode_error("enrollment"))
}

fn review_from_row(row: &PgRow) -> Result<ReviewRecord> {
    let decode = |row: &PgRow| -> sqlx::Result<ReviewRecord> {
        Ok(ReviewRecord {
            course_id: row.try_get("course_id")?,
            user_id: row.try_get("user_id")?,
            rating: row.try_get("rating")?,
            created_at: row.try_get("created_at")?,
        })
    };
    decode(row).map_err(decode_error("review"))
}

#[async_trait]
impl LearningStore for PgStore {
    async fn courses_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<CourseRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM learnline.courses \
             WHERE instructor_id = $1 ORDER BY created_at, id"
        ))
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(course_from_row).collect()
    }

    async fn enrollments_by_course_ids(
        &self,
        course_ids: &[Uuid],
    ) -> Result<Vec<EnrollmentRecord>> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT user_id, course_id, progress_percent, enrolled_at, last_accessed, \
             total_time_spent_hours, quiz_scores \
             FROM learnline.enrollments WHERE course_id = ANY($1)",
        )
        .bind(course_ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn reviews_by_course_ids(&self, course_ids: &[Uuid]) -> Result<Vec<ReviewRecord>> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT course_id, user_id, rating, created_at \
             FROM learnline.reviews WHERE course_id = ANY($1)",
        )
        .bind(course_ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(review_from_row).collect()
    }

    async fn enrollments_by_user(&self, user_id: Uuid) -> Result<Vec<EnrollmentRecord>> {
        let rows = sqlx::query(
            "SELECT user_id, course_id, progress_percent, enrolled_at, last_accessed, \
             total_time_spent_hours, quiz_scores \
             FROM learnline.enrollments WHERE user_id = $1 ORDER BY enrolled_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn courses_by_ids(&self, course_ids: &[Uuid]) -> Result<Vec<CourseRecord>> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM learnline.courses WHERE id = ANY($1)"
        ))
        .bind(course_ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(course_from_row).collect()
    }

    async fn courses_by_tags(&self, tags: &[String], limit: i64) -> Result<Vec<CourseRecord>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM learnline.courses \
             WHERE tags && $1 ORDER BY stats_total_enrollments DESC, id LIMIT $2"
        ))
        .bind(tags)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(course_from_row).collect()
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM learnline.users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }

    async fn count_users(&self, since: Option<DateTime<Utc>>) -> Result<i64> {
        let mut query = String::from("SELECT COUNT(*) FROM learnline.users");
        if since.is_some() {
            query.push_str(" WHERE created_at >= $1");
        }
        let mut rows = sqlx::query(&query);
        if let Some(since) = since {
            rows = rows.bind(since);
        }
        let row = rows.fetch_one(&self.pool).await?;
        Ok(row.get(0))
    }

    async fn count_courses(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM learnline.courses")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }

    async fn count_enrollments(&self, since: Option<DateTime<Utc>>) -> Result<i64> {
        let mut query = String::from("SELECT COUNT(*) FROM learnline.enrollments");
        if since.is_some() {
            query.push_str(" WHERE enrolled_at >= $1");
        }
        let mut rows = sqlx::query(&query);
        if let Some(since) = since {
            rows = rows.bind(since);
        }
        let row = rows.fetch_one(&self.pool).await?;
        Ok(row.get(0))
    }

    async fn enrollments_since(&self, since: DateTime<Utc>) -> Result<Vec<EnrollmentRecord>> {
        let rows = sqlx::query(
            "SELECT user_id, course_id, progress_percent, enrolled_at, last_accessed, \
             total_time_spent_hours, quiz_scores \
             FROM learnline.enrollments WHERE enrolled_at >= $1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn enrollment_counts_per_user(&self) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT COUNT(*) AS enrollment_count FROM learnline.enrollments GROUP BY user_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("enrollment_count")).collect())
    }

    async fn device_totals(&self) -> Result<DeviceTotals> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(device_mobile), 0)::BIGINT AS mobile, \
             COALESCE(SUM(device_desktop), 0)::BIGINT AS desktop, \
             COALESCE(SUM(device_tablet), 0)::BIGINT AS tablet \
             FROM learnline.users",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(DeviceTotals {
            mobile: row.get("mobile"),
            desktop: row.get("desktop"),
            tablet: row.get("tablet"),
        })
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts a small, realistic fixture: one instructor with three courses, a
/// handful of students with varied progress, and reviews. Idempotent.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let instructor_id = Uuid::parse_str("7b1e2c4a-51f0-4b7d-9a2e-8f3c6d1e0a55")?;

    let users = vec![
        (instructor_id, "Priya Nair", "priya.nair@learnline.dev", "instructor", (4i64, 60i64, 2i64), now - Duration::days(400)),
        (
            Uuid::parse_str("a3f1b9d2-6c48-4e0f-8d17-2b5a9c3e7f01")?,
            "Marco Silva",
            "marco.silva@learnline.dev",
            "student",
            (30, 12, 0),
            now - Duration::days(120),
        ),
        (
            Uuid::parse_str("c8d4e2f6-1a39-47b5-9c06-4e8f2a7b3d19")?,
            "Lena Fischer",
            "lena.fischer@learnline.dev",
            "student",
            (8, 45, 3),
            now - Duration::days(90),
        ),
        (
            Uuid::parse_str("e5a7c3b1-9d26-48f4-b310-7c2e6f4a8d92")?,
            "Tomás Rivera",
            "tomas.rivera@learnline.dev",
            "student",
            (55, 5, 1),
            now - Duration::days(10),
        ),
    ];

    for (id, name, email, role, (mobile, desktop, tablet), created_at) in users {
        sqlx::query(
            r#"
            INSERT INTO learnline.users
            (id, name, email, role, device_mobile, device_desktop, device_tablet, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, role = EXCLUDED.role
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(role)
        .bind(mobile)
        .bind(desktop)
        .bind(tablet)
        .bind(created_at)
        .execute(pool)
        .await?;
    }

    let rust_course = Uuid::parse_str("11aa22bb-33cc-44dd-a5ee-66ff77aa88b1")?;
    let sql_course = Uuid::parse_str("11aa22bb-33cc-44dd-a5ee-66ff77aa88b2")?;
    let async_course = Uuid::parse_str("11aa22bb-33cc-44dd-a5ee-66ff77aa88b3")?;

    let courses = vec![
        (rust_course, "Rust Fundamentals", 100.0, "programming", "beginner", vec!["rust", "systems"], 0i64, None::<f64>),
        (sql_course, "Practical SQL", 80.0, "databases", "beginner", vec!["sql", "data"], 0, None),
        // Retired course with no live rows; the report falls back to its
        // snapshot stats.
        (async_course, "Async Rust Patterns", 120.0, "programming", "advanced", vec!["rust", "async"], 35, Some(4.6)),
    ];

    for (id, title, price, category, level, tags, snap_enrollments, snap_rating) in courses {
        let tags: Vec<String> = tags.into_iter().map(String::from).collect();
        sqlx::query(
            r#"
            INSERT INTO learnline.courses
            (id, title, price, category, level, instructor_id, tags,
             stats_total_enrollments, stats_average_rating, stats_total_reviews,
             stats_completion_rate, stats_average_duration, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(price)
        .bind(category)
        .bind(level)
        .bind(instructor_id)
        .bind(&tags)
        .bind(snap_enrollments)
        .bind(snap_rating)
        .bind(if snap_rating.is_some() { 20i64 } else { 0 })
        .bind(0.0f64)
        .bind(if snap_rating.is_some() { 9.5f64 } else { 0.0 })
        .bind(now - Duration::days(300))
        .execute(pool)
        .await?;
    }

    let marco = Uuid::parse_str("a3f1b9d2-6c48-4e0f-8d17-2b5a9c3e7f01")?;
    let lena = Uuid::parse_str("c8d4e2f6-1a39-47b5-9c06-4e8f2a7b3d19")?;
    let tomas = Uuid::parse_str("e5a7c3b1-9d26-48f4-b310-7c2e6f4a8d92")?;

    let enrollments = vec![
        (marco, rust_course, 92.0, 80i64, Some(2i64), 24.0, vec![88.0, 95.0]),
        (marco, sql_course, 45.0, 40, Some(12), 10.5, vec![70.0]),
        (lena, rust_course, 85.0, 70, Some(25), 30.0, vec![91.0, 84.0, 77.0]),
        (lena, sql_course, 12.0, 100, Some(75), 2.0, vec![]),
        (tomas, rust_course, 30.0, 8, Some(1), 6.0, vec![62.0]),
    ];

    for (user_id, course_id, progress, enrolled_days_ago, accessed_days_ago, hours, quiz) in
        enrollments
    {
        sqlx::query(
            r#"
            INSERT INTO learnline.enrollments
            (id, user_id, course_id, progress_percent, enrolled_at, last_accessed,
             total_time_spent_hours, quiz_scores)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .bind(progress)
        .bind(now - Duration::days(enrolled_days_ago))
        .bind(accessed_days_ago.map(|d| now - Duration::days(d)))
        .bind(hours)
        .bind(&quiz)
        .execute(pool)
        .await?;
    }

    let reviews = vec![
        (marco, rust_course, 5, 20i64),
        (lena, rust_course, 4, 15),
        (marco, sql_course, 3, 5),
    ];

    for (user_id, course_id, rating, days_ago) in reviews {
        sqlx::query(
            r#"
            INSERT INTO learnline.reviews (id, course_id, user_id, rating, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(user_id)
        .bind(rating)
        .bind(now - Duration::days(days_ago))
        .execute(pool)
        .await?;
    }

    Ok(())
}
