use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use sqlx::{ConnectOptions, Pool, Row, Sqlite};

use crate::error::UnlockError;
use crate::models::{QuizResult, UnlockReceipt, UserProgress};

fn to_u32(v: i64) -> u32 {
    u32::try_from(v.max(0)).unwrap_or(u32::MAX)
}

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

impl Db {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .log_statements(log::LevelFilter::Trace);

        let pool = SqlitePool::connect_with(options).await?;

        let db = Db { pool };
        db.migrate().await?;

        Ok(db)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        let tables = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                email TEXT,
                display_name TEXT,
                total_points INTEGER NOT NULL DEFAULT 0,
                learning_streak INTEGER NOT NULL DEFAULT 0,
                last_login DATETIME,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS completed_concepts (
                user_id TEXT NOT NULL,
                lesson_id TEXT NOT NULL,
                completed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, lesson_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS quiz_results (
                user_id TEXT NOT NULL,
                quiz_id TEXT NOT NULL,
                score INTEGER NOT NULL,
                PRIMARY KEY (user_id, quiz_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS unlocked_modules (
                user_id TEXT NOT NULL,
                module_id TEXT NOT NULL,
                unlocked_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, module_id)
            )
            "#,
        ];

        for ddl in tables {
            sqlx::query(ddl).execute(&self.pool).await?;
        }

        Ok(())
    }

    pub async fn load_user(&self, user_id: &str) -> anyhow::Result<Option<UserProgress>> {
        let row = sqlx::query(
            "SELECT email, display_name, total_points, learning_streak, last_login FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut user = UserProgress::new(user_id);
        user.email = row.try_get("email")?;
        user.display_name = row.try_get("display_name")?;
        user.total_points = to_u32(row.try_get("total_points")?);
        user.learning_streak = to_u32(row.try_get("learning_streak")?);
        user.last_login_date = row.try_get::<Option<DateTime<Utc>>, _>("last_login")?;

        user.completed_concepts = sqlx::query_scalar::<_, String>("SELECT lesson_id FROM completed_concepts WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();

        let quizzes = sqlx::query("SELECT quiz_id, score FROM quiz_results WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        for row in quizzes {
            let quiz_id: String = row.try_get("quiz_id")?;
            let score: i64 = row.try_get("score")?;
            user.completed_quizzes
                .insert(quiz_id, QuizResult { score: to_u32(score) });
        }

        user.unlocked_modules = sqlx::query_scalar::<_, String>("SELECT module_id FROM unlocked_modules WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();

        Ok(Some(user))
    }

    /// Upserts a user record with field-level merge: completion sets are
    /// unioned, quiz scores keep the maximum, scalar fields are last write
    /// wins and absent optional fields keep the stored value.
    pub async fn save_user(&self, user: &UserProgress) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, display_name, total_points, learning_streak, last_login, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id) DO UPDATE SET
                email = COALESCE(excluded.email, users.email),
                display_name = COALESCE(excluded.display_name, users.display_name),
                total_points = excluded.total_points,
                learning_streak = excluded.learning_streak,
                last_login = COALESCE(excluded.last_login, users.last_login),
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(i64::from(user.total_points))
        .bind(i64::from(user.learning_streak))
        .bind(user.last_login_date)
        .execute(&mut *tx)
        .await?;

        for lesson_id in &user.completed_concepts {
            sqlx::query("INSERT OR IGNORE INTO completed_concepts (user_id, lesson_id) VALUES (?, ?)")
                .bind(&user.user_id)
                .bind(lesson_id)
                .execute(&mut *tx)
                .await?;
        }

        for (quiz_id, result) in &user.completed_quizzes {
            sqlx::query(
                r#"
                INSERT INTO quiz_results (user_id, quiz_id, score) VALUES (?, ?, ?)
                ON CONFLICT(user_id, quiz_id) DO UPDATE SET score = MAX(score, excluded.score)
                "#,
            )
            .bind(&user.user_id)
            .bind(quiz_id)
            .bind(i64::from(result.score))
            .execute(&mut *tx)
            .await?;
        }

        for module_id in &user.unlocked_modules {
            sqlx::query("INSERT OR IGNORE INTO unlocked_modules (user_id, module_id) VALUES (?, ?)")
                .bind(&user.user_id)
                .bind(module_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Spends points on a module in one transaction. The deduction is a
    /// conditional update on the stored balance, and the unlock row is
    /// claimed first, so neither a short balance nor a repeated request can
    /// take points twice. `user` seeds the row if it is not stored yet.
    ///
    /// The outer error is a storage failure, the inner one a refused unlock.
    pub async fn spend_points(
        &self,
        user: &UserProgress,
        module_id: &str,
        cost: u32,
    ) -> anyhow::Result<Result<UnlockReceipt, UnlockError>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (user_id, total_points) VALUES (?, ?) ON CONFLICT(user_id) DO NOTHING")
            .bind(&user.user_id)
            .bind(i64::from(user.total_points))
            .execute(&mut *tx)
            .await?;

        let claimed = sqlx::query("INSERT OR IGNORE INTO unlocked_modules (user_id, module_id) VALUES (?, ?)")
            .bind(&user.user_id)
            .bind(module_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if claimed == 0 {
            tx.rollback().await?;
            return Ok(Err(UnlockError::AlreadyUnlocked(module_id.to_string())));
        }

        let deducted = sqlx::query(
            "UPDATE users SET total_points = total_points - ?1, updated_at = CURRENT_TIMESTAMP WHERE user_id = ?2 AND total_points >= ?1",
        )
        .bind(i64::from(cost))
        .bind(&user.user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let balance: i64 = sqlx::query_scalar("SELECT total_points FROM users WHERE user_id = ?")
            .bind(&user.user_id)
            .fetch_one(&mut *tx)
            .await?;

        if deducted == 0 {
            tx.rollback().await?;
            return Ok(Err(UnlockError::InsufficientPoints {
                needed: cost,
                available: to_u32(balance),
            }));
        }

        tx.commit().await?;
        log::info!("{} unlocked {} for {} points", user.user_id, module_id, cost);

        Ok(Ok(UnlockReceipt {
            module_id: module_id.to_string(),
            cost,
            balance: to_u32(balance),
        }))
    }
}
