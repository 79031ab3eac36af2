//! Временные холды мест в Redis (`SET NX EX`), пока покупатель
//! выбирает места и оплачивает заказ.

use crate::cache::CacheService;
use redis::AsyncCommands;
use std::collections::HashSet;
use tracing::{info, warn};

fn hold_key(event_id: i64, seat: &str) -> String {
    format!("hold:{}:{}", event_id, seat)
}

/// Результат попытки удержать одно место
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Held {
    /// Холд создан этим вызовом
    New,
    /// Место уже было за этим пользователем, TTL продлён
    Extended,
    /// Место держит кто-то другой
    Taken,
}

/// (созданные этим вызовом, конфликтные). При откате снимаются только созданные.
fn split_outcomes(outcomes: Vec<(String, Held)>) -> (Vec<String>, Vec<String>) {
    let mut created = Vec::new();
    let mut conflicts = Vec::new();
    for (seat, held) in outcomes {
        match held {
            Held::New => created.push(seat),
            Held::Extended => {}
            Held::Taken => conflicts.push(seat),
        }
    }
    (created, conflicts)
}

impl CacheService {
    /// Атомарно резервирует одно место за пользователем.
    /// Повторный холд своим же пользователем продлевает TTL.
    async fn hold_seat(&self, event_id: i64, seat: &str, user_id: i64, ttl_seconds: u64) -> Result<Held, redis::RedisError> {
        let key = hold_key(event_id, seat);
        let mut conn = self.redis.conn.clone();
        let taken: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(user_id)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        if taken.is_some() {
            return Ok(Held::New);
        }

        let owner: Option<i64> = conn.get(&key).await?;
        if owner == Some(user_id) {
            let _: bool = conn.expire(&key, ttl_seconds as i64).await?;
            return Ok(Held::Extended);
        }
        Ok(Held::Taken)
    }

    /// Резервирует все места или ни одного; возвращает места, занятые другими
    pub async fn hold_seats(
        &self,
        event_id: i64,
        seats: &[String],
        user_id: i64,
        ttl_seconds: u64,
    ) -> Result<Vec<String>, redis::RedisError> {
        let mut outcomes = Vec::with_capacity(seats.len());
        for seat in seats {
            let held = self.hold_seat(event_id, seat, user_id, ttl_seconds).await?;
            outcomes.push((seat.clone(), held));
        }

        let (created, conflicts) = split_outcomes(outcomes);
        if !conflicts.is_empty() {
            // прежние холды пользователя остаются
            self.release_seats(event_id, &created, user_id).await?;
        } else {
            info!("User {} holds {} seats of event {}", user_id, seats.len(), event_id);
        }
        Ok(conflicts)
    }

    /// Снимает холды пользователя; чужие холды не трогаем
    pub async fn release_seats(&self, event_id: i64, seats: &[String], user_id: i64) -> Result<usize, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let mut released = 0;
        for seat in seats {
            let key = hold_key(event_id, seat);
            let owner: Option<i64> = conn.get(&key).await?;
            if owner == Some(user_id) {
                let _: () = conn.del(&key).await?;
                released += 1;
            }
        }
        Ok(released)
    }

    /// Места из списка, удерживаемые другими пользователями
    pub async fn seats_held_by_others(&self, event_id: i64, seats: &[String], user_id: i64) -> Vec<String> {
        if seats.is_empty() {
            return vec![];
        }
        let keys: Vec<String> = seats.iter().map(|s| hold_key(event_id, s)).collect();
        let mut conn = self.redis.conn.clone();
        let owners: Vec<Option<i64>> = match conn.mget(&keys).await {
            Ok(owners) => owners,
            Err(e) => {
                warn!("Failed to read seat holds for event {}: {:?}", event_id, e);
                return vec![];
            }
        };
        seats
            .iter()
            .zip(owners)
            .filter(|(_, owner)| owner.is_some_and(|o| o != user_id))
            .map(|(seat, _)| seat.clone())
            .collect()
    }

    /// Все места события, которые сейчас кто-то держит
    pub async fn held_seats(&self, event_id: i64) -> HashSet<String> {
        let prefix = format!("hold:{}:", event_id);
        let mut conn = self.redis.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{prefix}*"))
            .query_async(&mut conn)
            .await
            .unwrap_or_default();
        keys.into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// После покупки или отмены холды больше не нужны
    pub async fn clear_holds(&self, event_id: i64, seats: &[String]) {
        if seats.is_empty() {
            return;
        }
        let mut pipe = redis::pipe();
        for seat in seats {
            pipe.del(hold_key(event_id, seat)).ignore();
        }
        let mut conn = self.redis.conn.clone();
        if let Err(e) = pipe.query_async::<()>(&mut conn).await {
            warn!("Failed to clear seat holds for event {}: {:?}", event_id, e);
        }
    }
}
