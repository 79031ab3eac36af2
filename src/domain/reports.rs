//! reports.rs
//!
//! Отчёты для панели организатора и администратора зала.
//!
//! Все отчёты строятся в памяти по событиям и билетам, видимым пользователю:
//! - администратор зала видит всё;
//! - остальные видят только свои события и билеты на них.
//!
//! Периоды: `daily` (по часам), `weekly` (последние 7 дней), `monthly`
//! (по дням текущего месяца). Любое другое значение означает "за всё время"
//! с разбивкой как у `monthly`.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use super::seat_map::SEATS_PER_ROW;
use crate::models::{Event, Role, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportType {
    TicketSales,
    Revenue,
    SeatOccupancy,
    AuditoriumBookings,
    EventsHosted,
    UtilizationStatistics,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Unknown report type '{0}'")]
pub struct UnknownReportType(pub String);

impl FromStr for ReportType {
    type Err = UnknownReportType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticketSales" => Ok(ReportType::TicketSales),
            "revenue" => Ok(ReportType::Revenue),
            "seatOccupancy" => Ok(ReportType::SeatOccupancy),
            "auditoriumBookings" => Ok(ReportType::AuditoriumBookings),
            "eventsHosted" => Ok(ReportType::EventsHosted),
            "utilizationStatistics" => Ok(ReportType::UtilizationStatistics),
            other => Err(UnknownReportType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    All,
}

impl Period {
    pub fn parse(s: &str) -> Self {
        match s {
            "daily" => Period::Daily,
            "weekly" => Period::Weekly,
            "monthly" => Period::Monthly,
            _ => Period::All,
        }
    }

    fn max_days(&self) -> Option<i64> {
        match self {
            Period::Daily => Some(1),
            Period::Weekly => Some(7),
            Period::Monthly => Some(30),
            Period::All => None,
        }
    }

    /// Попадает ли момент `t` в период относительно `now` (в обе стороны)
    pub fn contains(&self, now: NaiveDateTime, t: NaiveDateTime) -> bool {
        match self.max_days() {
            Some(max) => (now - t).num_seconds().abs() / 86_400 <= max,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub label: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub period: String,
    pub labels: Vec<String>,
    pub series: Vec<f64>,
    pub table_data: Vec<TableRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<&'static str>,
}

/// Кто смотрит отчёт
#[derive(Debug, Clone)]
pub struct Viewer<'a> {
    pub email: &'a str,
    pub role: Role,
}

pub struct ReportInput<'a> {
    pub events: &'a [Event],
    pub tickets: &'a [Ticket],
    pub now: NaiveDateTime,
}

// --- Вспомогательные функции ---

fn scoped<'a>(viewer: &Viewer<'_>, input: &ReportInput<'a>) -> (Vec<&'a Event>, Vec<&'a Ticket>) {
    if viewer.role == Role::AuditoriumAdmin {
        return (input.events.iter().collect(), input.tickets.iter().collect());
    }
    let events = input.events.iter().filter(|e| e.is_owned_by(viewer.email)).collect();
    let tickets = input
        .tickets
        .iter()
        .filter(|t| t.organizer_email.as_deref() == Some(viewer.email))
        .collect();
    (events, tickets)
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (y, m) = (date.year(), date.month());
    let next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    match (next, NaiveDate::from_ymd_opt(y, m, 1)) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

fn weekday_label(date: NaiveDate) -> String {
    date.format("%a, %b %-d").to_string()
}

/// Подписи оси X для периода
pub fn bucket_labels(period: Period, now: NaiveDateTime) -> Vec<String> {
    match period {
        Period::Daily => (0..24).map(|h| format!("{h:02}:00")).collect(),
        Period::Weekly => (0..7)
            .rev()
            .map(|i| weekday_label(now.date() - Duration::days(i)))
            .collect(),
        Period::Monthly | Period::All => (1..=days_in_month(now.date())).map(|d| d.to_string()).collect(),
    }
}

pub fn bucket_label(period: Period, t: NaiveDateTime) -> String {
    match period {
        Period::Daily => t.format("%H:00").to_string(),
        Period::Weekly => weekday_label(t.date()),
        Period::Monthly | Period::All => t.day().to_string(),
    }
}

/// Раскладывает значения по корзинам периода
fn aggregate<I>(period: Period, now: NaiveDateTime, items: I) -> (Vec<String>, Vec<f64>)
where
    I: IntoIterator<Item = (NaiveDateTime, f64)>,
{
    let labels = bucket_labels(period, now);
    let mut sums: HashMap<&str, f64> = labels.iter().map(|l| (l.as_str(), 0.0)).collect();
    for (t, value) in items {
        let label = bucket_label(period, t);
        if let Some(slot) = sums.get_mut(label.as_str()) {
            *slot += value;
        }
    }
    let series = labels.iter().map(|l| sums.get(l.as_str()).copied().unwrap_or(0.0)).collect();
    (labels, series)
}

fn no_data(report_type: ReportType, period: &str, message: &str) -> ReportData {
    ReportData {
        report_type,
        period: period.to_string(),
        labels: vec![],
        series: vec![],
        table_data: vec![],
        message: Some(format!(
            "{message} Please try a different report type, period, or ensure there is data for the selected criteria."
        )),
        chart_type: None,
    }
}

fn row(label: impl Into<String>, value: Value) -> TableRow {
    TableRow { label: label.into(), value }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

fn event_start(event: &Event) -> NaiveDateTime {
    event.date.and_time(chrono::NaiveTime::MIN)
}

// --- Отчёты ---

pub fn generate(report_type: ReportType, period: &str, viewer: &Viewer<'_>, input: &ReportInput<'_>) -> ReportData {
    match report_type {
        ReportType::TicketSales => ticket_sales(period, viewer, input),
        ReportType::Revenue => revenue(period, viewer, input),
        ReportType::SeatOccupancy => seat_occupancy(period, viewer, input),
        ReportType::EventsHosted => events_hosted(period, viewer, input),
        ReportType::AuditoriumBookings => auditorium_bookings(period, viewer, input),
        ReportType::UtilizationStatistics => utilization(period, viewer, input),
    }
}

fn tickets_in_period<'a>(period: Period, input: &ReportInput<'_>, tickets: Vec<&'a Ticket>) -> Vec<&'a Ticket> {
    tickets
        .into_iter()
        .filter(|t| period.contains(input.now, t.purchased_at.naive_utc()))
        .collect()
}

pub fn ticket_sales(period_name: &str, viewer: &Viewer<'_>, input: &ReportInput<'_>) -> ReportData {
    let period = Period::parse(period_name);
    let (_, tickets) = scoped(viewer, input);
    let tickets = tickets_in_period(period, input, tickets);
    if tickets.is_empty() {
        return no_data(ReportType::TicketSales, period_name, "No ticket sales data available for the selected period.");
    }

    let (labels, series) = aggregate(
        period,
        input.now,
        tickets.iter().map(|t| (t.purchased_at.naive_utc(), 1.0)),
    );

    ReportData {
        report_type: ReportType::TicketSales,
        period: period_name.to_string(),
        labels,
        series,
        table_data: vec![row("Total Tickets Sold", json!(tickets.len()))],
        message: None,
        chart_type: Some("bar"),
    }
}

pub fn revenue(period_name: &str, viewer: &Viewer<'_>, input: &ReportInput<'_>) -> ReportData {
    let period = Period::parse(period_name);
    let (_, tickets) = scoped(viewer, input);
    let tickets = tickets_in_period(period, input, tickets);
    if tickets.is_empty() {
        return no_data(ReportType::Revenue, period_name, "No revenue data available for the selected period.");
    }

    let (labels, series) = aggregate(
        period,
        input.now,
        tickets.iter().map(|t| (t.purchased_at.naive_utc(), t.total as f64)),
    );
    // в итог идут только билеты, попавшие в корзину графика
    let total = series.iter().sum::<f64>().round() as i64;

    ReportData {
        report_type: ReportType::Revenue,
        period: period_name.to_string(),
        labels,
        series,
        table_data: vec![row("Total Revenue", json!(total))],
        message: None,
        chart_type: Some("line"),
    }
}

pub fn seat_occupancy(period_name: &str, viewer: &Viewer<'_>, input: &ReportInput<'_>) -> ReportData {
    let (events, tickets) = scoped(viewer, input);
    if events.is_empty() {
        return no_data(
            ReportType::SeatOccupancy,
            period_name,
            "No event capacity data available to calculate seat occupancy.",
        );
    }

    let mut labels = Vec::with_capacity(events.len());
    let mut series = Vec::with_capacity(events.len());
    let mut table_data = Vec::with_capacity(events.len());

    for event in events {
        let booked: usize = tickets
            .iter()
            .filter(|t| t.event_id == event.id)
            .map(|t| t.seats.len())
            .sum();
        let capacity = event.seat_configuration.len() as f64 * SEATS_PER_ROW as f64;
        let occupancy = percent(booked as f64, capacity);

        labels.push(event.title.clone());
        series.push(occupancy);
        table_data.push(row(event.title.clone(), json!(format!("{occupancy:.2}%"))));
    }

    ReportData {
        report_type: ReportType::SeatOccupancy,
        period: period_name.to_string(),
        labels,
        series,
        table_data,
        message: None,
        chart_type: Some("pie"),
    }
}

pub fn events_hosted(period_name: &str, viewer: &Viewer<'_>, input: &ReportInput<'_>) -> ReportData {
    let period = Period::parse(period_name);
    let (events, _) = scoped(viewer, input);
    let events: Vec<&Event> = events
        .into_iter()
        .filter(|e| period.contains(input.now, event_start(e)))
        .collect();
    if events.is_empty() {
        return no_data(ReportType::EventsHosted, period_name, "No events hosted data available for the selected period.");
    }

    let (labels, series) = aggregate(period, input.now, events.iter().map(|e| (event_start(e), 1.0)));

    ReportData {
        report_type: ReportType::EventsHosted,
        period: period_name.to_string(),
        labels,
        series,
        table_data: vec![row("Total Events Hosted", json!(events.len()))],
        message: None,
        chart_type: Some("bar"),
    }
}

/// Сколько событий проходит на каждой площадке за период
pub fn auditorium_bookings(period_name: &str, viewer: &Viewer<'_>, input: &ReportInput<'_>) -> ReportData {
    let period = Period::parse(period_name);
    let (events, _) = scoped(viewer, input);
    let mut by_location: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events.iter().filter(|e| period.contains(input.now, event_start(e))) {
        *by_location.entry(event.location.as_str()).or_default() += 1;
    }
    if by_location.is_empty() {
        return no_data(
            ReportType::AuditoriumBookings,
            period_name,
            "No auditorium booking data available for the selected period.",
        );
    }

    ReportData {
        report_type: ReportType::AuditoriumBookings,
        period: period_name.to_string(),
        labels: by_location.keys().map(|l| l.to_string()).collect(),
        series: by_location.values().map(|c| *c as f64).collect(),
        table_data: by_location.iter().map(|(l, c)| row(*l, json!(c))).collect(),
        message: None,
        chart_type: Some("bar"),
    }
}

/// Общая загрузка зала по всем видимым событиям
pub fn utilization(period_name: &str, viewer: &Viewer<'_>, input: &ReportInput<'_>) -> ReportData {
    let (events, _) = scoped(viewer, input);
    let capacity: i64 = events
        .iter()
        .map(|e| e.seat_configuration.len() as i64 * SEATS_PER_ROW as i64)
        .sum();
    if capacity == 0 {
        return no_data(
            ReportType::UtilizationStatistics,
            period_name,
            "No utilization data available for the selected period.",
        );
    }
    let booked: i64 = events.iter().map(|e| e.booked_seats.len() as i64).sum();
    let booked = booked.min(capacity);
    let available = capacity - booked;
    let utilization = percent(booked as f64, capacity as f64);

    ReportData {
        report_type: ReportType::UtilizationStatistics,
        period: period_name.to_string(),
        labels: vec!["Booked".to_string(), "Available".to_string()],
        series: vec![booked as f64, available as f64],
        table_data: vec![
            row("Total Capacity", json!(capacity)),
            row("Booked Seats", json!(booked)),
            row("Available Seats", json!(available)),
            row("Utilization", json!(format!("{utilization:.2}%"))),
        ],
        message: None,
        chart_type: Some("doughnut"),
    }
}
