use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;

use crate::models::event::EVENT_COLUMNS;
use crate::models::{Event, EventView};

pub const MAX_PAGE_SIZE: u32 = 50;

/// Клиент для поиска событий
#[derive(Clone)]
pub struct SearchClient {
    pool: PgPool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventSearch {
    pub query: String,
    pub date: Option<NaiveDate>,
    pub page: u32,
    pub page_size: u32,
}

impl EventSearch {
    pub fn new(query: Option<&str>, date: Option<NaiveDate>, page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            query: prepare_search_query(query.unwrap_or_default()),
            date,
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(20).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) * self.page_size) as i64
    }

    fn pattern(&self) -> Option<String> {
        (!self.query.is_empty()).then(|| format!("%{}%", self.query))
    }
}

/// Тело ответа GET /api/events, в этом же виде лежит в кеше
#[derive(Debug, Serialize)]
pub struct EventPage {
    pub success: bool,
    pub events: Vec<EventView>,
    pub total: i64,
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
}

impl EventPage {
    pub fn new(events: Vec<Event>, total: i64, search: &EventSearch) -> Self {
        Self {
            success: true,
            events: events.into_iter().map(|e| e.view(false)).collect(),
            total,
            page: search.page,
            page_size: search.page_size,
        }
    }
}

impl SearchClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Страница событий по тексту (название, площадка, описание) и дате
    pub async fn search_events(&self, search: &EventSearch) -> Result<(Vec<Event>, i64), sqlx::Error> {
        let pattern = search.pattern();
        let filter = "($1::TEXT IS NULL OR title ILIKE $1 OR location ILIKE $1 OR description ILIKE $1)
                      AND ($2::DATE IS NULL OR date = $2)";

        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE {filter}
             ORDER BY date, time, id
             LIMIT $3 OFFSET $4"
        ))
        .bind(&pattern)
        .bind(search.date)
        .bind(search.limit())
        .bind(search.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM events WHERE {filter}"))
            .bind(&pattern)
            .bind(search.date)
            .fetch_one(&self.pool)
            .await?;

        Ok((events, total))
    }
}

fn prepare_search_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '\'')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_normalized() {
        let s = EventSearch::new(Some("  Jazz   night!! "), None, None, None);
        assert_eq!(s.query, "Jazz night");
        assert_eq!(s.pattern().as_deref(), Some("%Jazz night%"));
        assert_eq!(EventSearch::new(Some("***"), None, None, None).pattern(), None);
    }

    #[test]
    fn page_body_uses_listing_field_names() {
        let search = EventSearch::new(None, None, Some(2), Some(10));
        let body = serde_json::to_value(EventPage::new(vec![], 0, &search)).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["page"], 2);
        assert_eq!(body["pageSize"], 10);
        assert_eq!(body["total"], 0);
        assert!(body["events"].as_array().unwrap().is_empty());
    }

    #[test]
    fn paging_is_clamped() {
        let s = EventSearch::new(None, None, Some(0), Some(500));
        assert_eq!((s.page, s.page_size), (1, MAX_PAGE_SIZE));
        let s = EventSearch::new(None, None, Some(3), Some(10));
        assert_eq!((s.limit(), s.offset()), (10, 20));
    }
}
