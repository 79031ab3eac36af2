pub mod user;
pub mod event;
pub mod ticket;
pub mod waitlist;

pub use user::{Role, User};
pub use event::{Event, EventView, PromoCode, SeatConfigEntry, TicketCategory};
pub use ticket::Ticket;
pub use waitlist::WaitlistEntry;

use serde::de::DeserializeOwned;

/// Разбирает JSON-колонку; битые данные превращаются в пустое значение.
pub(crate) fn lenient_json<T>(value: serde_json::Value, column: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match serde_json::from_value(value) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("malformed JSON in column {}: {}", column, e);
            T::default()
        }
    }
}
