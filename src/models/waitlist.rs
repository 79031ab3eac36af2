use serde::Serialize;
use sqlx::{FromRow, PgConnection};
use chrono::{DateTime, Utc};

use crate::database::Database;
use crate::domain::validation::waitlist_full;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WaitlistEntry {
    pub id: i64,
    pub event_id: i64,
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// Итог попытки встать в лист ожидания
#[derive(Debug)]
pub enum JoinOutcome {
    Joined(WaitlistEntry),
    Full,
    NoEvent,
}

impl WaitlistEntry {
    pub async fn count_for_event(conn: &mut PgConnection, event_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM waitlist_entries WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(conn)
            .await
    }

    /// Подсчёт и вставка под блокировкой строки события,
    /// параллельные заявки не превысят `capacity`
    pub async fn join(
        db: &Database,
        event_id: i64,
        user_id: Option<i64>,
        email: Option<&str>,
        phone: Option<&str>,
        capacity: i64,
    ) -> Result<JoinOutcome, sqlx::Error> {
        let mut tx = db.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(JoinOutcome::NoEvent);
        }

        let count = Self::count_for_event(&mut *tx, event_id).await?;
        if waitlist_full(count, capacity) {
            return Ok(JoinOutcome::Full);
        }

        let entry = Self::insert(&mut *tx, event_id, user_id, email, phone).await?;
        tx.commit().await?;
        Ok(JoinOutcome::Joined(entry))
    }

    async fn insert(
        conn: &mut PgConnection,
        event_id: i64,
        user_id: Option<i64>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<WaitlistEntry, sqlx::Error> {
        sqlx::query_as::<_, WaitlistEntry>(
            "INSERT INTO waitlist_entries (event_id, user_id, email, phone)
             VALUES ($1, $2, $3, $4)
             RETURNING id, event_id, user_id, email, phone, joined_at",
        )
        .bind(event_id)
        .bind(user_id)
        .bind(email)
        .bind(phone)
        .fetch_one(conn)
        .await
    }

    pub async fn list_for_event(db: &Database, event_id: i64) -> Result<Vec<WaitlistEntry>, sqlx::Error> {
        sqlx::query_as::<_, WaitlistEntry>(
            "SELECT id, event_id, user_id, email, phone, joined_at
             FROM waitlist_entries WHERE event_id = $1 ORDER BY joined_at",
        )
        .bind(event_id)
        .fetch_all(&db.pool)
        .await
    }

    /// Удаляет записи пользователя (по id или по email)
    pub async fn remove(db: &Database, event_id: i64, user_id: i64, email: &str) -> Result<u64, sqlx::Error> {
        sqlx::query(
            "DELETE FROM waitlist_entries WHERE event_id = $1 AND (user_id = $2 OR email = $3)",
        )
        .bind(event_id)
        .bind(user_id)
        .bind(email)
        .execute(&db.pool)
        .await
        .map(|r| r.rows_affected())
    }

    /// Записи на прошедшие события
    pub async fn delete_for_past_events(db: &Database) -> Result<u64, sqlx::Error> {
        sqlx::query(
            "DELETE FROM waitlist_entries w USING events e
             WHERE w.event_id = e.id AND e.date < CURRENT_DATE",
        )
        .execute(&db.pool)
        .await
        .map(|r| r.rows_affected())
    }
}
