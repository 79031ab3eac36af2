use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Row};
use chrono::{DateTime, NaiveDate, Utc};

use super::lenient_json;
use crate::database::Database;
use crate::domain::pricing::CategoryTable;
use crate::domain::seat_map::SeatSelection;

/// Купленный билет: снимок события, места, суммы и данные оплаты
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub event_title: String,
    pub event_date: NaiveDate,
    pub event_time: String,
    pub event_location: String,
    pub poster: Option<String>,
    pub organizer_email: Option<String>,
    pub seats: Vec<String>,
    pub seat_details: Vec<SeatSelection>,
    pub category_table: CategoryTable,
    pub applied_promo: Option<String>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
    pub payment_method: String,
    pub payment_reference: String,
    pub eticket_code: String,
    pub purchased_at: DateTime<Utc>,
    pub is_read: bool,
}

impl FromRow<'_, PgRow> for Ticket {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let seats: Vec<String> = row.try_get("seats")?;
        let mut seat_details: Vec<SeatSelection> =
            lenient_json(row.try_get("seat_details")?, "seat_details");
        // Старые билеты без деталей: все места считаются REG
        if seat_details.is_empty() {
            seat_details = seats.iter().map(|s| SeatSelection::regular(s)).collect();
        }

        Ok(Ticket {
            id: row.try_get("id")?,
            event_id: row.try_get("event_id")?,
            user_id: row.try_get("user_id")?,
            event_title: row.try_get("event_title")?,
            event_date: row.try_get("event_date")?,
            event_time: row.try_get("event_time")?,
            event_location: row.try_get("event_location")?,
            poster: row.try_get("poster")?,
            organizer_email: row.try_get("organizer_email")?,
            seats,
            seat_details,
            category_table: lenient_json(row.try_get("category_table")?, "category_table"),
            applied_promo: row.try_get("applied_promo")?,
            subtotal: row.try_get("subtotal")?,
            discount_amount: row.try_get("discount_amount")?,
            total: row.try_get("total")?,
            payment_method: row.try_get("payment_method")?,
            payment_reference: row.try_get("payment_reference")?,
            eticket_code: row.try_get("eticket_code")?,
            purchased_at: row.try_get("purchased_at")?,
            is_read: row.try_get("is_read")?,
        })
    }
}

pub const TICKET_COLUMNS: &str = "id, event_id, user_id, event_title, event_date, event_time, \
     event_location, poster, organizer_email, seats, seat_details, category_table, \
     applied_promo, subtotal, discount_amount, total, payment_method, payment_reference, \
     eticket_code, purchased_at, is_read";

/// Данные нового билета до вставки
#[derive(Debug, Clone)]
pub struct NewTicket<'a> {
    pub user_id: i64,
    pub event: &'a super::Event,
    pub seats: Vec<String>,
    pub seat_details: &'a [SeatSelection],
    pub category_table: &'a CategoryTable,
    pub applied_promo: Option<String>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
    pub payment_method: &'a str,
    pub payment_reference: &'a str,
}

impl Ticket {
    pub async fn insert(conn: &mut sqlx::PgConnection, new: &NewTicket<'_>) -> Result<Ticket, sqlx::Error> {
        let seat_details = serde_json::to_value(new.seat_details).unwrap_or_default();
        let category_table = serde_json::to_value(new.category_table).unwrap_or_default();
        sqlx::query_as::<_, Ticket>(&format!(
            "INSERT INTO tickets (event_id, user_id, event_title, event_date, event_time, event_location,
                                  poster, organizer_email, seats, seat_details, category_table,
                                  applied_promo, subtotal, discount_amount, total,
                                  payment_method, payment_reference)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(new.event.id)
        .bind(new.user_id)
        .bind(&new.event.title)
        .bind(new.event.date)
        .bind(&new.event.time)
        .bind(&new.event.location)
        .bind(&new.event.poster)
        .bind(&new.event.organizer_email)
        .bind(&new.seats)
        .bind(seat_details)
        .bind(category_table)
        .bind(&new.applied_promo)
        .bind(new.subtotal)
        .bind(new.discount_amount)
        .bind(new.total)
        .bind(new.payment_method)
        .bind(new.payment_reference)
        .fetch_one(conn)
        .await
    }

    pub async fn set_eticket_code(conn: &mut sqlx::PgConnection, id: i64, code: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tickets SET eticket_code = $2 WHERE id = $1")
            .bind(id)
            .bind(code)
            .execute(conn)
            .await
            .map(|_| ())
    }

    pub async fn lock_for_user(conn: &mut sqlx::PgConnection, id: i64, user_id: i64) -> Result<Option<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn delete(conn: &mut sqlx::PgConnection, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .map(|_| ())
    }

    pub async fn find_for_user(db: &Database, id: i64, user_id: i64) -> Result<Option<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&db.pool)
        .await
    }

    // Новые билеты первыми
    pub async fn list_for_user(db: &Database, user_id: i64) -> Result<Vec<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE user_id = $1 ORDER BY purchased_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&db.pool)
        .await
    }

    pub async fn all(db: &Database) -> Result<Vec<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(&format!("SELECT {TICKET_COLUMNS} FROM tickets"))
            .fetch_all(&db.pool)
            .await
    }

    pub async fn mark_read(db: &Database, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("UPDATE tickets SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&db.pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }

    pub async fn mark_all_read(db: &Database, user_id: i64) -> Result<u64, sqlx::Error> {
        sqlx::query("UPDATE tickets SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(&db.pool)
            .await
            .map(|r| r.rows_affected())
    }
}
