//! policy.rs
//!
//! Правила после покупки: окно отмены билета (дни до начала события
//! округляются вверх), счётчик непрочитанных уведомлений и сводка типов мест.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::pricing::{type_label, CategoryTable};
use super::seat_map::SeatSelection;
use crate::models::Ticket;

pub const DEFAULT_CANCELLATION_WINDOW_DAYS: i64 = 7;

/// Начало события; некорректное время считается полуночью
pub fn event_starts_at(date: NaiveDate, time: &str) -> NaiveDateTime {
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").unwrap_or(NaiveTime::MIN);
    date.and_time(time)
}

/// Сколько дней осталось до события, с округлением вверх
pub fn days_until(starts_at: NaiveDateTime, now: NaiveDateTime) -> i64 {
    let seconds = (starts_at - now).num_seconds();
    seconds.div_euclid(86_400) + i64::from(seconds.rem_euclid(86_400) != 0)
}

pub fn can_cancel(starts_at: NaiveDateTime, now: NaiveDateTime, window_days: i64) -> bool {
    days_until(starts_at, now) >= window_days
}

pub fn cancellation_message(window_days: i64) -> String {
    format!("Booking can only be cancelled {window_days} days or more prior to the event.")
}

pub fn unread_count(tickets: &[Ticket]) -> usize {
    tickets.iter().filter(|t| !t.is_read).count()
}

/// "VIP x 2, Children x 1" в порядке первого появления типа
pub fn seat_type_summary(details: &[SeatSelection], table: &CategoryTable) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for d in details {
        match counts.iter_mut().find(|(code, _)| *code == d.type_code) {
            Some((_, n)) => *n += 1,
            None => counts.push((d.type_code.as_str(), 1)),
        }
    }
    counts
        .iter()
        .map(|(code, n)| format!("{} x {}", type_label(table, code), n))
        .collect::<Vec<_>>()
        .join(", ")
}
