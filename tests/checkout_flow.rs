//! Путь покупателя без БД: схема зала -> выбор мест -> промокод -> билет -> отчёты.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::Fake;

use event_tickets::domain::policy;
use event_tickets::domain::reports::{self, ReportInput, ReportType, Viewer};
use event_tickets::domain::seat_map::{self, Selection};
use event_tickets::models::{Event, PromoCode, Role, SeatConfigEntry, Ticket, TicketCategory};
use event_tickets::services::booking::price_order;
use event_tickets::services::payment::eticket_code;

fn concert(organizer: &str) -> Event {
    Event {
        id: 3,
        title: "Live Music Night".into(),
        date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
        time: "19:30".into(),
        location: "Main Auditorium".into(),
        description: "Local bands".into(),
        poster: None,
        organizer_email: Some(organizer.to_string()),
        is_new: true,
        is_special: false,
        ticket_categories: vec![
            TicketCategory { name: "VIP".into(), short_name: "VIP".into(), price: 65_000 },
            TicketCategory { name: "General Admission".into(), short_name: "REG".into(), price: 45_000 },
        ],
        seat_configuration: vec![
            SeatConfigEntry { row: "A".into(), category: "VIP".into() },
            SeatConfigEntry { row: "B".into(), category: "REG".into() },
            SeatConfigEntry { row: "AA".into(), category: "REG".into() },
        ],
        booked_seats: vec!["A1".into(), "A2".into()],
        promo_codes: vec![PromoCode {
            code: "EARLYBIRD".into(),
            discount: 10.0,
            expiry: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            applicable_categories: vec![],
        }],
        created_at: Utc::now(),
    }
}

#[test]
fn buyer_selects_seats_applies_promo_and_gets_ticket() {
    let organizer: String = SafeEmail().fake();
    let mut event = concert(&organizer);
    let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    // Схема зала и выбор мест
    let map = seat_map::generate(&event.seat_configuration, &event.booked_seats);
    assert_eq!(event.available_seats(), 88);

    let mut selection = Selection::default();
    for id in ["A1", "A3", "B5", "AA1"] {
        let seat = map.find(id).unwrap().clone();
        selection.toggle(&seat);
    }
    // A1 продано, выбрать нельзя
    assert_eq!(selection.ids(), &["A3".to_string(), "B5".to_string(), "AA1".to_string()]);

    let table = seat_map::category_table(&event.ticket_categories);
    assert_eq!(selection.total_price(&map, &table), 155_000);

    // Оформление заказа с промокодом
    let seat_data = selection.to_seat_data(&map).unwrap();
    assert_eq!(seat_data, "A3:VIP,B5:REG,AA1:REG");
    let order = price_order(&event, &seat_data, Some("earlybird"), today).unwrap();
    assert_eq!(order.quote.subtotal, 155_000);
    assert_eq!(order.quote.discount_amount, 15_500);
    assert_eq!(order.quote.total, 139_500);
    assert_eq!(
        policy::seat_type_summary(&order.selections, &order.table),
        "VIP x 1, General Admission x 2"
    );

    // Билет
    let seats: Vec<String> = order.selections.iter().map(|s| s.seat.clone()).collect();
    let purchased_at = Utc.from_utc_datetime(&today.and_hms_opt(12, 0, 0).unwrap());
    let ticket = Ticket {
        id: 1,
        event_id: event.id,
        user_id: 9,
        event_title: event.title.clone(),
        event_date: event.date,
        event_time: event.time.clone(),
        event_location: event.location.clone(),
        poster: None,
        organizer_email: event.organizer_email.clone(),
        seats: seats.clone(),
        seat_details: order.selections.clone(),
        category_table: order.table.clone(),
        applied_promo: order.quote.applied_promo.as_ref().map(|p| p.code.clone()),
        subtotal: order.quote.subtotal,
        discount_amount: order.quote.discount_amount,
        total: order.quote.total,
        payment_method: "creditCard".into(),
        payment_reference: "PAY-test".into(),
        eticket_code: eticket_code(1, &seats, "secret"),
        purchased_at,
        is_read: false,
    };
    event.booked_seats.extend(seats.iter().cloned());

    // Повторная покупка тех же мест отклоняется
    assert!(price_order(&event, &seat_data, None, today).is_err());
    assert_eq!(policy::unread_count(std::slice::from_ref(&ticket)), 1);

    // Отмена: за 10 дней можно, за 3 дня нельзя
    let starts = policy::event_starts_at(ticket.event_date, &ticket.event_time);
    assert!(policy::can_cancel(starts, purchased_at.naive_utc(), 7));
    assert!(!policy::can_cancel(starts, starts - Duration::days(3), 7));

    // Отчёты организатора
    let events = vec![event];
    let tickets = vec![ticket];
    let viewer = Viewer { email: &organizer, role: Role::Organizer };
    let input = ReportInput {
        events: &events,
        tickets: &tickets,
        now: today.and_hms_opt(18, 0, 0).unwrap(),
    };

    let revenue = reports::generate(ReportType::Revenue, "daily", &viewer, &input);
    assert_eq!(revenue.series[12], 139_500.0);
    assert!(revenue.message.is_none());

    let utilization = reports::generate(ReportType::UtilizationStatistics, "all", &viewer, &input);
    assert_eq!(utilization.series, vec![5.0, 85.0]);

    // Чужой организатор ничего не видит
    let stranger = Viewer { email: "someone@else.org", role: Role::Organizer };
    let empty = reports::generate(ReportType::TicketSales, "daily", &stranger, &input);
    assert!(empty.message.is_some());
}
