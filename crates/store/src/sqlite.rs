//! SQLite store for the knowledge corpus, submission history and learning
//! resources.
//!
//! Tables:
//! - `exemplars`: question/answer pairs with tags as a JSON array
//! - `exercises`: practice problems, read-only to the engine
//! - `submissions`: attempts with their error annotations as JSON
//! - `learning_resources`: curated links fed to the resource matcher

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};
use tutorgraph_core::corpus::{Difficulty, Exemplar, Exercise, NewExemplar};
use tutorgraph_core::error::StoreError;
use tutorgraph_core::history::{Attempt, ErrorEvent, ExperienceLevel, SubmissionStatus};
use tutorgraph_core::resource::{LearningResource, ResourceKind};
use tutorgraph_core::store::{KnowledgeStore, SubmissionStore};
use uuid::Uuid;

/// Map a sqlx error: connection-level failures are `Unavailable`, the rest
/// are query failures.
fn map_err(context: &str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(format!("{context}: {e}")),
        other => StoreError::QueryFailed(format!("{context}: {other}")),
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_json_list<T: serde::de::DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_default()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::QueryFailed(format!("serialize: {e}")))
}

/// Enum values are stored as their JSON string form.
fn enum_to_text<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(to_json(value)?.trim_matches('"').to_string())
}

fn enum_from_text<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).ok()
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            (
                "exemplars table",
                r#"
                CREATE TABLE IF NOT EXISTS exemplars (
                    iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                    id           TEXT UNIQUE NOT NULL,
                    question     TEXT NOT NULL,
                    answer       TEXT NOT NULL,
                    category     TEXT NOT NULL DEFAULT 'general',
                    tags         TEXT NOT NULL DEFAULT '[]',
                    priority     INTEGER NOT NULL DEFAULT 1,
                    usage_count  INTEGER NOT NULL DEFAULT 0,
                    is_active    INTEGER NOT NULL DEFAULT 1,
                    created_at   TEXT NOT NULL
                )
                "#,
            ),
            (
                "question index",
                "CREATE INDEX IF NOT EXISTS idx_exemplars_question ON exemplars(question)",
            ),
            (
                "exercises table",
                r#"
                CREATE TABLE IF NOT EXISTS exercises (
                    iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                    id           TEXT UNIQUE NOT NULL,
                    title        TEXT NOT NULL,
                    description  TEXT NOT NULL DEFAULT '',
                    language     TEXT NOT NULL,
                    difficulty   TEXT NOT NULL,
                    category     TEXT NOT NULL DEFAULT 'general',
                    tags         TEXT NOT NULL DEFAULT '[]',
                    points       INTEGER NOT NULL DEFAULT 0,
                    is_active    INTEGER NOT NULL DEFAULT 1,
                    created_at   TEXT NOT NULL
                )
                "#,
            ),
            (
                "submissions table",
                r#"
                CREATE TABLE IF NOT EXISTS submissions (
                    id            TEXT PRIMARY KEY,
                    user_id       TEXT NOT NULL,
                    exercise_id   TEXT,
                    status        TEXT NOT NULL,
                    errors        TEXT NOT NULL DEFAULT '[]',
                    submitted_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "submissions index",
                "CREATE INDEX IF NOT EXISTS idx_submissions_user ON submissions(user_id, submitted_at DESC)",
            ),
            (
                "learning_resources table",
                r#"
                CREATE TABLE IF NOT EXISTS learning_resources (
                    id             TEXT PRIMARY KEY,
                    title          TEXT NOT NULL,
                    url            TEXT NOT NULL,
                    kind           TEXT NOT NULL,
                    language       TEXT,
                    level          TEXT NOT NULL DEFAULT 'beginner',
                    error_types    TEXT NOT NULL DEFAULT '[]',
                    tags           TEXT NOT NULL DEFAULT '[]',
                    quality_score  REAL NOT NULL DEFAULT 1.0,
                    is_active      INTEGER NOT NULL DEFAULT 1
                )
                "#,
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(format!("migration ({what}): {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_exemplar(row: &sqlx::sqlite::SqliteRow) -> Result<Exemplar, StoreError> {
        let col = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));
        let tags: String = row.try_get("tags").map_err(|e| col("tags", e))?;
        let created_at: String = row.try_get("created_at").map_err(|e| col("created_at", e))?;
        let usage: i64 = row.try_get("usage_count").map_err(|e| col("usage_count", e))?;

        Ok(Exemplar {
            id: row.try_get("id").map_err(|e| col("id", e))?,
            question: row.try_get("question").map_err(|e| col("question", e))?,
            answer: row.try_get("answer").map_err(|e| col("answer", e))?,
            category: row.try_get("category").map_err(|e| col("category", e))?,
            tags: parse_json_list(&tags),
            priority: row.try_get("priority").map_err(|e| col("priority", e))?,
            usage_count: usage.max(0) as u64,
            is_active: row.try_get("is_active").map_err(|e| col("is_active", e))?,
            created_at: parse_time(&created_at),
        })
    }

    fn row_to_exercise(row: &sqlx::sqlite::SqliteRow) -> Result<Exercise, StoreError> {
        let col = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));
        let difficulty: String = row.try_get("difficulty").map_err(|e| col("difficulty", e))?;
        let tags: String = row.try_get("tags").map_err(|e| col("tags", e))?;
        let created_at: String = row.try_get("created_at").map_err(|e| col("created_at", e))?;
        let points: i64 = row.try_get("points").map_err(|e| col("points", e))?;

        Ok(Exercise {
            id: row.try_get("id").map_err(|e| col("id", e))?,
            title: row.try_get("title").map_err(|e| col("title", e))?,
            description: row.try_get("description").map_err(|e| col("description", e))?,
            language: row.try_get("language").map_err(|e| col("language", e))?,
            difficulty: Difficulty::from_str(&difficulty).map_err(StoreError::QueryFailed)?,
            category: row.try_get("category").map_err(|e| col("category", e))?,
            tags: parse_json_list(&tags),
            points: points.clamp(0, u32::MAX as i64) as u32,
            is_active: row.try_get("is_active").map_err(|e| col("is_active", e))?,
            created_at: parse_time(&created_at),
        })
    }

    /// Insert or replace an exercise. Exercises are curated outside the
    /// engine; this exists for seeding.
    pub async fn upsert_exercise(&self, exercise: &Exercise) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO exercises (id, title, description, language, difficulty, category, tags, points, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                language = excluded.language,
                difficulty = excluded.difficulty,
                category = excluded.category,
                tags = excluded.tags,
                points = excluded.points,
                is_active = excluded.is_active
            "#,
        )
        .bind(&exercise.id)
        .bind(&exercise.title)
        .bind(&exercise.description)
        .bind(&exercise.language)
        .bind(exercise.difficulty.as_str())
        .bind(&exercise.category)
        .bind(to_json(&exercise.tags)?)
        .bind(exercise.points as i64)
        .bind(exercise.is_active)
        .bind(exercise.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_err("upsert exercise", e))?;
        Ok(())
    }

    /// Record a graded attempt. Seeding only; the engine never writes history.
    pub async fn record_attempt(&self, attempt: &Attempt) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO submissions (id, user_id, exercise_id, status, errors, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.user_id)
        .bind(attempt.exercise.as_ref().map(|e| e.id.clone()))
        .bind(enum_to_text(&attempt.status)?)
        .bind(to_json(&attempt.errors)?)
        .bind(attempt.submitted_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_err("record attempt", e))?;
        Ok(())
    }

    pub async fn upsert_resource(&self, resource: &LearningResource) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO learning_resources
                (id, title, url, kind, language, level, error_types, tags, quality_score, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&resource.id)
        .bind(&resource.title)
        .bind(&resource.url)
        .bind(enum_to_text(&resource.kind)?)
        .bind(resource.language.as_deref())
        .bind(resource.level.as_str())
        .bind(to_json(&resource.error_types)?)
        .bind(to_json(&resource.tags)?)
        .bind(resource.quality_score)
        .bind(resource.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_err("upsert resource", e))?;
        Ok(())
    }

    /// Every active learning resource.
    pub async fn active_resources(&self) -> Result<Vec<LearningResource>, StoreError> {
        let rows = sqlx::query("SELECT * FROM learning_resources WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err("list resources", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind: String = row.try_get("kind").map_err(|e| map_err("kind column", e))?;
            let level: String = row.try_get("level").map_err(|e| map_err("level column", e))?;
            let errors: String = row
                .try_get("error_types")
                .map_err(|e| map_err("error_types column", e))?;
            let tags: String = row.try_get("tags").map_err(|e| map_err("tags column", e))?;

            let Some(kind) = enum_from_text::<ResourceKind>(&kind) else {
                warn!(kind = %kind, "Skipping resource with unknown kind");
                continue;
            };

            out.push(LearningResource {
                id: row.try_get("id").map_err(|e| map_err("id column", e))?,
                title: row.try_get("title").map_err(|e| map_err("title column", e))?,
                url: row.try_get("url").map_err(|e| map_err("url column", e))?,
                kind,
                language: row.try_get("language").map_err(|e| map_err("language column", e))?,
                level: enum_from_text::<ExperienceLevel>(&level)
                    .unwrap_or(ExperienceLevel::Beginner),
                error_types: parse_json_list(&errors),
                tags: parse_json_list(&tags),
                quality_score: row
                    .try_get("quality_score")
                    .map_err(|e| map_err("quality_score column", e))?,
                is_active: true,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn active_exemplars(&self) -> Result<Vec<Exemplar>, StoreError> {
        let rows = sqlx::query("SELECT * FROM exemplars WHERE is_active = 1 ORDER BY iid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err("list exemplars", e))?;
        rows.iter().map(Self::row_to_exemplar).collect()
    }

    async fn active_exercises(&self) -> Result<Vec<Exercise>, StoreError> {
        let rows = sqlx::query("SELECT * FROM exercises WHERE is_active = 1 ORDER BY iid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err("list exercises", e))?;
        rows.iter().map(Self::row_to_exercise).collect()
    }

    async fn increment_usage(&self, ids: &[String]) -> Result<(), StoreError> {
        for id in ids {
            sqlx::query("UPDATE exemplars SET usage_count = usage_count + 1 WHERE id = ?1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| map_err("increment usage", e))?;
        }
        Ok(())
    }

    async fn find_by_question(&self, question: &str) -> Result<Option<Exemplar>, StoreError> {
        let row = sqlx::query("SELECT * FROM exemplars WHERE question = ?1 LIMIT 1")
            .bind(question)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_err("find by question", e))?;
        row.as_ref().map(Self::row_to_exemplar).transpose()
    }

    async fn insert_exemplar(&self, exemplar: NewExemplar) -> Result<Exemplar, StoreError> {
        let created = Exemplar {
            id: Uuid::new_v4().to_string(),
            question: exemplar.question,
            answer: exemplar.answer,
            category: exemplar.category,
            tags: exemplar.tags,
            priority: exemplar.priority,
            usage_count: 0,
            is_active: exemplar.is_active,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO exemplars (id, question, answer, category, tags, priority, usage_count, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)
            "#,
        )
        .bind(&created.id)
        .bind(&created.question)
        .bind(&created.answer)
        .bind(&created.category)
        .bind(to_json(&created.tags)?)
        .bind(created.priority)
        .bind(created.is_active)
        .bind(created.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_err("insert exemplar", e))?;

        Ok(created)
    }

    async fn update_exemplar(&self, exemplar: Exemplar) -> Result<Exemplar, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE exemplars SET
                question = ?2,
                answer = ?3,
                category = ?4,
                tags = ?5,
                priority = ?6,
                usage_count = MAX(usage_count, ?7),
                is_active = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&exemplar.id)
        .bind(&exemplar.question)
        .bind(&exemplar.answer)
        .bind(&exemplar.category)
        .bind(to_json(&exemplar.tags)?)
        .bind(exemplar.priority)
        .bind(exemplar.usage_count as i64)
        .bind(exemplar.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_err("update exemplar", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(exemplar.id));
        }

        let row = sqlx::query("SELECT * FROM exemplars WHERE id = ?1")
            .bind(&exemplar.id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err("reload exemplar", e))?;
        Self::row_to_exemplar(&row)
    }

    async fn delete_exemplar(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM exemplars WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_err("delete exemplar", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn import_exemplars(&self, exemplars: Vec<NewExemplar>) -> Result<usize, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_err("begin import", e))?;

        let mut count = 0;
        for e in exemplars {
            sqlx::query(
                r#"
                INSERT INTO exemplars (id, question, answer, category, tags, priority, usage_count, is_active, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&e.question)
            .bind(&e.answer)
            .bind(&e.category)
            .bind(to_json(&e.tags)?)
            .bind(e.priority)
            .bind(e.is_active)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_err("import exemplar", e))?;
            count += 1;
        }

        tx.commit().await.map_err(|e| map_err("commit import", e))?;
        Ok(count)
    }

    async fn count_active(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM exemplars WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err("count exemplars", e))?;
        let n: i64 = row.try_get("n").map_err(|e| map_err("count column", e))?;
        Ok(n.max(0) as usize)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_err("health check", e))?;
        Ok(true)
    }
}

#[async_trait]
impl SubmissionStore for SqliteStore {
    async fn recent_attempts(
        &self,
        user_id: &str,
        exercise_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Attempt>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.id AS sid, s.user_id, s.exercise_id, s.status, s.errors, s.submitted_at,
                   e.id AS eid
            FROM submissions s
            LEFT JOIN exercises e ON e.id = s.exercise_id
            WHERE s.user_id = ?1 AND (?2 IS NULL OR s.exercise_id = ?2)
            ORDER BY s.submitted_at DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(exercise_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_err("recent attempts", e))?;

        let mut attempts = Vec::with_capacity(rows.len());
        for row in &rows {
            let status: String = row.try_get("status").map_err(|e| map_err("status column", e))?;
            let errors: String = row.try_get("errors").map_err(|e| map_err("errors column", e))?;
            let submitted_at: String = row
                .try_get("submitted_at")
                .map_err(|e| map_err("submitted_at column", e))?;
            let eid: Option<String> = row.try_get("eid").map_err(|e| map_err("eid column", e))?;

            let exercise = match eid {
                Some(id) => {
                    let ex_row = sqlx::query("SELECT * FROM exercises WHERE id = ?1")
                        .bind(&id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| map_err("resolve exercise", e))?;
                    ex_row.as_ref().map(Self::row_to_exercise).transpose()?
                }
                None => None,
            };

            attempts.push(Attempt {
                id: row.try_get("sid").map_err(|e| map_err("sid column", e))?,
                user_id: row.try_get("user_id").map_err(|e| map_err("user_id column", e))?,
                exercise,
                status: enum_from_text::<SubmissionStatus>(&status)
                    .unwrap_or(SubmissionStatus::Pending),
                errors: parse_json_list::<ErrorEvent>(&errors),
                submitted_at: parse_time(&submitted_at),
            });
        }
        Ok(attempts)
    }
}
