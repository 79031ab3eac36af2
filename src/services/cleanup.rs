use chrono::NaiveDate;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{Event, WaitlistEntry};
use crate::AppState;

pub struct CleanupService {
    state: Arc<AppState>,
}

impl CleanupService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Запускает полную очистку: листы ожидания прошедших событий + висящие холды
    pub async fn run_full_cleanup(&self) {
        info!("Starting cleanup process");

        self.cleanup_past_waitlists().await;
        self.cleanup_orphaned_holds().await;

        let stats = self.get_cleanup_stats().await;
        info!(
            "Cleanup process completed: {} waitlist entries for past events left, {} active seat holds",
            stats.past_waitlist_entries, stats.seat_holds
        );
    }

    async fn cleanup_past_waitlists(&self) {
        match WaitlistEntry::delete_for_past_events(&self.state.db).await {
            Ok(0) => info!("No waitlist entries for past events"),
            Ok(n) => info!("Removed {} waitlist entries for past events", n),
            Err(e) => error!("Failed to clean up waitlists: {:?}", e),
        }
    }

    /// Холды на уже проданные места или на удалённые/прошедшие события
    async fn cleanup_orphaned_holds(&self) {
        let mut redis_conn = self.state.redis.conn.clone();
        let keys: Vec<String> = match redis::cmd("KEYS").arg("hold:*").query_async(&mut redis_conn).await {
            Ok(keys) => keys,
            Err(e) => {
                error!("Failed to list seat holds: {:?}", e);
                return;
            }
        };

        if keys.is_empty() {
            info!("No seat holds to check");
            return;
        }

        let mut events: HashMap<i64, EventLookup> = HashMap::new();
        let today = chrono::Utc::now().date_naive();
        let mut orphaned = Vec::new();

        for key in keys {
            let Some((event_id, seat)) = parse_hold_key(&key) else {
                orphaned.push(key);
                continue;
            };
            if !events.contains_key(&event_id) {
                let lookup = match Event::find_by_id(&self.state.db, event_id).await {
                    Ok(Some(event)) => EventLookup::Found(event),
                    Ok(None) => EventLookup::Missing,
                    Err(e) => {
                        error!("Keeping holds of event {}, lookup failed: {:?}", event_id, e);
                        EventLookup::Unreadable
                    }
                };
                events.insert(event_id, lookup);
            }
            let stale = events
                .get(&event_id)
                .is_some_and(|lookup| hold_is_stale(lookup, seat, today));
            if stale {
                orphaned.push(key);
            }
        }

        if orphaned.is_empty() {
            info!("No orphaned seat holds found");
            return;
        }

        let count = orphaned.len();
        match redis_conn.del::<_, i64>(orphaned).await {
            Ok(removed) => info!("Cleaned up {} orphaned seat holds", removed),
            Err(e) => error!("Failed to delete {} orphaned seat holds: {:?}", count, e),
        }
    }

    /// Статистика для мониторинга
    pub async fn get_cleanup_stats(&self) -> CleanupStats {
        let past_waitlist_entries: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM waitlist_entries w JOIN events e ON e.id = w.event_id
             WHERE e.date < CURRENT_DATE",
        )
        .fetch_one(&self.state.db.pool)
        .await
        .unwrap_or(0);

        let mut redis_conn = self.state.redis.conn.clone();
        let seat_holds: i64 = redis::cmd("EVAL")
            .arg("return #redis.call('keys', ARGV[1])")
            .arg(0)
            .arg("hold:*")
            .query_async(&mut redis_conn)
            .await
            .unwrap_or(0);

        CleanupStats { past_waitlist_entries, seat_holds }
    }
}

enum EventLookup {
    Found(Event),
    Missing,
    /// БД не ответила: холды не трогаем до следующего прохода
    Unreadable,
}

fn hold_is_stale(lookup: &EventLookup, seat: &str, today: NaiveDate) -> bool {
    match lookup {
        EventLookup::Found(event) => event.date < today || event.booked_seats.iter().any(|s| s == seat),
        EventLookup::Missing => true,
        EventLookup::Unreadable => false,
    }
}

/// "hold:7:A12" -> (7, "A12")
fn parse_hold_key(key: &str) -> Option<(i64, &str)> {
    let rest = key.strip_prefix("hold:")?;
    let (event_id, seat) = rest.split_once(':')?;
    Some((event_id.parse().ok()?, seat))
}

#[derive(Debug, Default, serde::Serialize)]
pub struct CleanupStats {
    pub past_waitlist_entries: i64,
    pub seat_holds: i64,
}
