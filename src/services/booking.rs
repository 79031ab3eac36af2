//! Покупка и отмена билетов.
//!
//! Запись идёт в транзакции с `SELECT ... FOR UPDATE` по строке события,
//! поэтому два покупателя не могут продать одно место дважды. Оплата
//! проходит до блокировки, заказ перепроверяется уже под ней.

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::domain::policy;
use crate::domain::pricing::{self, CategoryTable, PromoError, Quote};
use crate::domain::seat_map::{self, SeatMapError, SeatSelection};
use crate::error::{AppError, AppResult};
use crate::models::ticket::NewTicket;
use crate::models::{Event, Ticket};
use crate::services::payment::{eticket_code, PaymentMethod, PaymentSimulator};
use crate::AppState;

impl From<SeatMapError> for AppError {
    fn from(e: SeatMapError) -> Self {
        match e {
            SeatMapError::AlreadyBooked(_) => AppError::Conflict(e.to_string()),
            _ => AppError::Validation(e.to_string()),
        }
    }
}

impl From<PromoError> for AppError {
    fn from(e: PromoError) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Оценённый заказ: места с типами из конфигурации рядов и сумма
#[derive(Debug, Clone)]
pub struct PricedOrder {
    pub selections: Vec<SeatSelection>,
    pub table: CategoryTable,
    pub quote: Quote,
}

/// Проверяет места по схеме зала и считает сумму с промокодом
pub fn price_order(
    event: &Event,
    seat_data: &str,
    promo_code: Option<&str>,
    today: NaiveDate,
) -> AppResult<PricedOrder> {
    let requested = seat_map::parse_seat_data(seat_data);
    let map = seat_map::generate(&event.seat_configuration, &event.booked_seats);
    let selections = map.resolve(&requested)?;
    let table = seat_map::category_table(&event.ticket_categories);
    let quote = pricing::quote(&selections, &table, &event.promo_codes, promo_code, today)?;
    Ok(PricedOrder { selections, table, quote })
}

pub async fn quote(state: &AppState, event_id: i64, seat_data: &str, promo_code: Option<&str>) -> AppResult<PricedOrder> {
    let event = Event::find_by_id(&state.db, event_id)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))?;
    price_order(&event, seat_data, promo_code, Utc::now().date_naive())
}

#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub event_id: i64,
    pub seat_data: String,
    pub promo_code: Option<String>,
    pub payment_method: PaymentMethod,
}

/// Заказ, пересчитанный под блокировкой, должен совпасть с оплаченным
fn confirm_order(charged: &PricedOrder, locked: &PricedOrder) -> AppResult<()> {
    if charged.selections != locked.selections || charged.quote.total != locked.quote.total {
        return Err(AppError::conflict(
            "Seat availability or prices changed during payment, please review your order",
        ));
    }
    Ok(())
}

pub async fn purchase(state: &AppState, user_id: i64, req: &PurchaseRequest) -> AppResult<Ticket> {
    let today = Utc::now().date_naive();

    // 1. Предварительная оценка без блокировки
    let event = Event::find_by_id(&state.db, req.event_id)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))?;
    if event.date < today {
        return Err(AppError::validation("This event has already taken place."));
    }
    let order = price_order(&event, &req.seat_data, req.promo_code.as_deref(), today)?;
    let seats: Vec<String> = order.selections.iter().map(|s| s.seat.clone()).collect();

    let held = state.cache.seats_held_by_others(event.id, &seats, user_id).await;
    if let Some(seat) = held.first() {
        return Err(AppError::conflict(format!("Seat {seat} is being held by another customer")));
    }

    // 2. Оплата вне транзакции: строка события не держится на время платежа
    let payment = PaymentSimulator::from_config(&state.config.payment);
    let receipt = payment
        .charge(req.payment_method, order.quote.total)
        .await
        .map_err(|e| AppError::validation(e.to_string()))?;

    // 3. Под блокировкой проверяем, что места ещё свободны и сумма та же
    let mut tx = state.db.pool.begin().await?;
    let locked = Event::lock(&mut *tx, req.event_id)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))?;
    let confirmed = price_order(&locked, &req.seat_data, req.promo_code.as_deref(), today)
        .and_then(|locked_order| confirm_order(&order, &locked_order));
    if let Err(e) = confirmed {
        warn!("Payment {} voided for user {}: {}", receipt.reference, user_id, e);
        return Err(e);
    }

    let mut ticket = Ticket::insert(
        &mut *tx,
        &NewTicket {
            user_id,
            event: &locked,
            seats: seats.clone(),
            seat_details: &order.selections,
            category_table: &order.table,
            applied_promo: order.quote.applied_promo.as_ref().map(|p| p.code.clone()),
            subtotal: order.quote.subtotal,
            discount_amount: order.quote.discount_amount,
            total: order.quote.total,
            payment_method: req.payment_method.as_str(),
            payment_reference: &receipt.reference,
        },
    )
    .await?;

    ticket.eticket_code = eticket_code(ticket.id, &seats, &state.config.payment.eticket_secret);
    Ticket::set_eticket_code(&mut *tx, ticket.id, &ticket.eticket_code).await?;
    Event::add_booked_seats(&mut *tx, locked.id, &seats).await?;

    tx.commit().await?;

    state.cache.clear_holds(locked.id, &seats).await;
    state.cache.invalidate_events().await;

    info!(
        "Ticket {} issued: user {} event {} seats [{}] total {}",
        ticket.id,
        user_id,
        locked.id,
        seats.join(","),
        ticket.total
    );
    Ok(ticket)
}

/// Отмена: только владелец и не позже окна отмены до начала события
pub async fn cancel(state: &AppState, user_id: i64, ticket_id: i64) -> AppResult<Ticket> {
    let mut tx = state.db.pool.begin().await?;

    let ticket = Ticket::lock_for_user(&mut *tx, ticket_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket not found"))?;

    let window = state.config.booking.cancellation_window_days;
    let starts_at = policy::event_starts_at(ticket.event_date, &ticket.event_time);
    if !policy::can_cancel(starts_at, Utc::now().naive_utc(), window) {
        return Err(AppError::validation(policy::cancellation_message(window)));
    }

    match Event::lock(&mut *tx, ticket.event_id).await? {
        Some(_) => Event::remove_booked_seats(&mut *tx, ticket.event_id, &ticket.seats).await?,
        None => warn!("Ticket {} refers to missing event {}", ticket.id, ticket.event_id),
    }
    Ticket::delete(&mut *tx, ticket.id).await?;

    tx.commit().await?;

    state.cache.invalidate_events().await;
    info!("Ticket {} cancelled by user {}, seats [{}] released", ticket.id, user_id, ticket.seats.join(","));
    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PromoCode, SeatConfigEntry, TicketCategory};

    fn event() -> Event {
        Event {
            id: 1,
            title: "Live Music Night".into(),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            time: "19:00".into(),
            location: "Main Auditorium".into(),
            description: String::new(),
            poster: None,
            organizer_email: Some("org@example.com".into()),
            is_new: false,
            is_special: true,
            ticket_categories: vec![
                TicketCategory { name: "VIP".into(), short_name: "VIP".into(), price: 65_000 },
                TicketCategory { name: "Children".into(), short_name: "CHD".into(), price: 25_000 },
            ],
            seat_configuration: vec![
                SeatConfigEntry { row: "A".into(), category: "VIP".into() },
                SeatConfigEntry { row: "B".into(), category: "CHD".into() },
            ],
            booked_seats: vec!["A1".into()],
            promo_codes: vec![PromoCode {
                code: "KIDS".into(),
                discount: 50.0,
                expiry: NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
                applicable_categories: vec!["CHD".into()],
            }],
            created_at: Utc::now(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    #[test]
    fn row_category_overrides_client_type() {
        let order = price_order(&event(), "A2:CHD,B2:CHD", Some("kids"), day()).unwrap();
        assert_eq!(order.selections[0].type_code, "VIP");
        assert_eq!(order.quote.subtotal, 90_000);
        assert_eq!(order.quote.discount_amount, 12_500);
        assert_eq!(order.quote.total, 77_500);
    }

    #[test]
    fn booked_seat_is_a_conflict() {
        let err = price_order(&event(), "A1:VIP", None, day()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn empty_or_unknown_seats_are_validation_errors() {
        assert!(matches!(price_order(&event(), "", None, day()), Err(AppError::Validation(_))));
        assert!(matches!(price_order(&event(), "Q9:VIP", None, day()), Err(AppError::Validation(_))));
    }

    #[test]
    fn expired_promo_is_rejected() {
        let later = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let err = price_order(&event(), "B3:CHD", Some("KIDS"), later).unwrap_err();
        assert_eq!(err.to_string(), "Promo code 'KIDS' has expired");
    }

    #[test]
    fn unchanged_order_is_confirmed_under_lock() {
        let charged = price_order(&event(), "B2:CHD,B3:CHD", Some("KIDS"), day()).unwrap();
        let locked = price_order(&event(), "B2:CHD,B3:CHD", Some("KIDS"), day()).unwrap();
        assert!(confirm_order(&charged, &locked).is_ok());
    }

    #[test]
    fn seat_sold_during_payment_is_a_conflict() {
        let charged = price_order(&event(), "B2:CHD", None, day()).unwrap();
        let mut sold = event();
        sold.booked_seats.push("B2".into());
        let err = price_order(&sold, "B2:CHD", None, day())
            .and_then(|locked| confirm_order(&charged, &locked))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn price_change_during_payment_is_a_conflict() {
        let charged = price_order(&event(), "A2:VIP", None, day()).unwrap();
        let mut repriced = event();
        repriced.ticket_categories[0].price = 70_000;
        let locked = price_order(&repriced, "A2:VIP", None, day()).unwrap();
        assert!(matches!(confirm_order(&charged, &locked), Err(AppError::Conflict(_))));
    }
}
