use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use chrono::{DateTime, NaiveDate, Utc};

use super::lenient_json;
use crate::database::Database;
use crate::domain::seat_map;
use crate::domain::validation::ValidEvent;

/// Ценовая категория билета (VIP, REG, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketCategory {
    pub name: String,
    pub short_name: String,
    pub price: i64,
}

/// Привязка ряда к категории
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatConfigEntry {
    pub row: String,
    pub category: String,
}

/// Промокод события
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    /// Скидка в процентах
    pub discount: f64,
    pub expiry: NaiveDate,
    /// Пустой список означает "все категории"
    #[serde(default)]
    pub applicable_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub location: String,
    pub description: String,
    pub poster: Option<String>,
    pub organizer_email: Option<String>,
    pub is_new: bool,
    pub is_special: bool,
    pub ticket_categories: Vec<TicketCategory>,
    pub seat_configuration: Vec<SeatConfigEntry>,
    pub booked_seats: Vec<String>,
    #[serde(skip_serializing)]
    pub promo_codes: Vec<PromoCode>,
    pub created_at: DateTime<Utc>,
}

// JSON-колонки читаем вручную, чтобы битые данные не роняли запрос
impl FromRow<'_, PgRow> for Event {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Event {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            date: row.try_get("date")?,
            time: row.try_get("time")?,
            location: row.try_get("location")?,
            description: row.try_get("description")?,
            poster: row.try_get("poster")?,
            organizer_email: row.try_get("organizer_email")?,
            is_new: row.try_get("is_new")?,
            is_special: row.try_get("is_special")?,
            ticket_categories: lenient_json(row.try_get("ticket_categories")?, "ticket_categories"),
            seat_configuration: lenient_json(row.try_get("seat_configuration")?, "seat_configuration"),
            booked_seats: row.try_get("booked_seats")?,
            promo_codes: lenient_json(row.try_get("promo_codes")?, "promo_codes"),
            created_at: row.try_get("created_at")?,
        })
    }
}

pub const EVENT_COLUMNS: &str = "id, title, date, time, location, description, poster, \
     organizer_email, is_new, is_special, ticket_categories, seat_configuration, \
     booked_seats, promo_codes, created_at";

impl Event {
    pub fn available_seats(&self) -> i64 {
        seat_map::available_seats(self.seat_configuration.len(), self.booked_seats.len())
    }

    pub fn is_owned_by(&self, email: &str) -> bool {
        self.organizer_email.as_deref() == Some(email)
    }

    pub fn view(self, include_promos: bool) -> EventView {
        let available_seats = self.available_seats();
        let promo_codes = include_promos.then(|| self.promo_codes.clone());
        EventView { event: self, available_seats, promo_codes }
    }
}

fn json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_default()
}

impl Event {
    pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&db.pool)
            .await
    }

    /// Строка события под блокировкой до конца транзакции
    pub async fn lock(conn: &mut sqlx::PgConnection, id: i64) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn all(db: &Database) -> Result<Vec<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY date, time"))
            .fetch_all(&db.pool)
            .await
    }

    /// Занята ли дата другим событием
    pub async fn date_taken(db: &Database, date: NaiveDate, except: Option<i64>) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM events WHERE date = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(date)
        .bind(except)
        .fetch_one(&db.pool)
        .await
    }

    pub async fn insert(db: &Database, form: &ValidEvent, organizer_email: &str) -> Result<Event, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events (title, date, time, location, description, poster, organizer_email,
                                 is_new, is_special, ticket_categories, seat_configuration, promo_codes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(&form.title)
        .bind(form.date)
        .bind(&form.time)
        .bind(&form.location)
        .bind(&form.description)
        .bind(&form.poster)
        .bind(organizer_email)
        .bind(form.is_new)
        .bind(form.is_special)
        .bind(json(&form.ticket_categories))
        .bind(json(&form.seat_configuration))
        .bind(json(&form.promo_codes))
        .fetch_one(&db.pool)
        .await
    }

    /// Проданные места и владелец не меняются
    pub async fn update(db: &Database, id: i64, form: &ValidEvent) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET title = $2, date = $3, time = $4, location = $5, description = $6,
                    poster = $7, is_new = $8, is_special = $9, ticket_categories = $10,
                    seat_configuration = $11, promo_codes = $12
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&form.title)
        .bind(form.date)
        .bind(&form.time)
        .bind(&form.location)
        .bind(&form.description)
        .bind(&form.poster)
        .bind(form.is_new)
        .bind(form.is_special)
        .bind(json(&form.ticket_categories))
        .bind(json(&form.seat_configuration))
        .bind(json(&form.promo_codes))
        .fetch_optional(&db.pool)
        .await
    }

    pub async fn add_booked_seats(conn: &mut sqlx::PgConnection, id: i64, seats: &[String]) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE events SET booked_seats = booked_seats || $2::TEXT[] WHERE id = $1")
            .bind(id)
            .bind(seats)
            .execute(conn)
            .await
            .map(|_| ())
    }

    pub async fn remove_booked_seats(conn: &mut sqlx::PgConnection, id: i64, seats: &[String]) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE events
             SET booked_seats = ARRAY(SELECT s FROM unnest(booked_seats) AS s WHERE NOT (s = ANY($2::TEXT[])))
             WHERE id = $1",
        )
        .bind(id)
        .bind(seats)
        .execute(conn)
        .await
        .map(|_| ())
    }
}

/// Событие в том виде, в каком его отдаёт API
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub available_seats: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_codes: Option<Vec<PromoCode>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> Event {
        Event {
            id: 7,
            title: "Digital Innovation Conference".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: "09:00".into(),
            location: "Main Auditorium".into(),
            description: "Future of technology".into(),
            poster: None,
            organizer_email: Some("org@example.com".into()),
            is_new: true,
            is_special: false,
            ticket_categories: vec![],
            seat_configuration: vec![
                SeatConfigEntry { row: "A".into(), category: "VIP".into() },
                SeatConfigEntry { row: "B".into(), category: "REG".into() },
            ],
            booked_seats: vec!["A1".into(), "A2".into()],
            promo_codes: vec![PromoCode {
                code: "EARLY".into(),
                discount: 10.0,
                expiry: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                applicable_categories: vec![],
            }],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn available_seats_counts_configured_rows() {
        assert_eq!(event().available_seats(), 58);
    }

    #[test]
    fn promo_codes_only_visible_to_owner_view() {
        let public = serde_json::to_value(event().view(false)).unwrap();
        assert!(public.get("promo_codes").is_none());
        assert_eq!(public["available_seats"], 58);
        assert_eq!(public["title"], "Digital Innovation Conference");

        let owner = serde_json::to_value(event().view(true)).unwrap();
        assert_eq!(owner["promo_codes"][0]["code"], "EARLY");
    }

    #[test]
    fn ownership_is_by_email() {
        assert!(event().is_owned_by("org@example.com"));
        assert!(!event().is_owned_by("other@example.com"));
    }
}
