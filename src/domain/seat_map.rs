//! seat_map.rs
//!
//! Схема зала: 10 рядов партера (A..J) и 5 рядов балкона (AA..EE),
//! по 30 мест в каждом. Места не хранятся в БД, а строятся на лету
//! из конфигурации рядов события и списка уже проданных мест.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::pricing::{CategoryPrice, CategoryTable};
use crate::models::{SeatConfigEntry, TicketCategory};

pub const LOWER_ROWS: [&str; 10] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];
pub const BALCONY_ROWS: [&str; 5] = ["AA", "BB", "CC", "DD", "EE"];
pub const SEATS_PER_ROW: u32 = 30;

/// Категория по умолчанию, когда у события нет настроек
pub const DEFAULT_CATEGORY: &str = "GEN";
pub const DEFAULT_CATEGORY_NAME: &str = "General";
pub const DEFAULT_CATEGORY_PRICE: i64 = 25_000;

/// Тип места, если его не удалось определить
pub const FALLBACK_TYPE: &str = "REG";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SeatMapError {
    #[error("Please choose at least 1 seat first")]
    EmptySelection,
    #[error("Seat {0} does not exist")]
    UnknownSeat(String),
    #[error("Seat {0} was selected more than once")]
    DuplicateSeat(String),
    #[error("Seat {0} is already booked")]
    AlreadyBooked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Seat {
    pub id: String,
    pub booked: bool,
    pub category: String,
}

/// Место + код типа билета, как в строке "A1:VIP"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSelection {
    pub seat: String,
    pub type_code: String,
}

impl SeatSelection {
    pub fn new(seat: impl Into<String>, type_code: impl Into<String>) -> Self {
        Self { seat: seat.into(), type_code: type_code.into() }
    }

    pub fn regular(seat: &str) -> Self {
        Self::new(seat, FALLBACK_TYPE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    rows: Vec<Vec<Seat>>,
}

pub fn all_rows() -> impl Iterator<Item = &'static str> {
    LOWER_ROWS.iter().chain(BALCONY_ROWS.iter()).copied()
}

pub fn is_valid_row(row: &str) -> bool {
    all_rows().any(|r| r == row)
}

/// Разбирает "BB12" на ряд и номер
pub fn split_seat_id(id: &str) -> Option<(&str, u32)> {
    let pos = id.find(|c: char| c.is_ascii_digit())?;
    let (row, number) = id.split_at(pos);
    let number: u32 = number.parse().ok()?;
    if is_valid_row(row) && (1..=SEATS_PER_ROW).contains(&number) {
        Some((row, number))
    } else {
        None
    }
}

/// Таблица категорий: short_name -> {name, price}
pub fn category_table(categories: &[TicketCategory]) -> CategoryTable {
    let mut table: CategoryTable = categories
        .iter()
        .map(|c| (c.short_name.clone(), CategoryPrice { name: c.name.clone(), price: c.price }))
        .collect();
    if table.is_empty() {
        table.insert(
            DEFAULT_CATEGORY.to_string(),
            CategoryPrice { name: DEFAULT_CATEGORY_NAME.to_string(), price: DEFAULT_CATEGORY_PRICE },
        );
    }
    table
}

/// Ряд -> категория. Без конфигурации все ряды общие (GEN)
pub fn row_categories(config: &[SeatConfigEntry]) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = config
        .iter()
        .map(|c| (c.row.clone(), c.category.clone()))
        .collect();
    if map.is_empty() {
        for row in all_rows() {
            map.insert(row.to_string(), DEFAULT_CATEGORY.to_string());
        }
    }
    map
}

/// Свободные места события: ряды из конфигурации * 30 минус проданные
pub fn available_seats(configured_rows: usize, booked: usize) -> i64 {
    let total = configured_rows as i64 * SEATS_PER_ROW as i64;
    (total - booked as i64).max(0)
}

pub fn generate(config: &[SeatConfigEntry], booked: &[String]) -> SeatMap {
    let categories = row_categories(config);
    let booked: HashSet<&str> = booked.iter().map(String::as_str).collect();

    let rows = all_rows()
        .map(|row| {
            let category = categories
                .get(row)
                .cloned()
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
            (1..=SEATS_PER_ROW)
                .map(|n| {
                    let id = format!("{row}{n}");
                    Seat { booked: booked.contains(id.as_str()), id, category: category.clone() }
                })
                .collect()
        })
        .collect();

    SeatMap { rows }
}

impl SeatMap {
    pub fn rows(&self) -> &[Vec<Seat>] {
        &self.rows
    }

    pub fn lower_foyer(&self) -> &[Vec<Seat>] {
        &self.rows[..LOWER_ROWS.len()]
    }

    pub fn balcony(&self) -> &[Vec<Seat>] {
        &self.rows[LOWER_ROWS.len()..]
    }

    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.rows.iter().flatten()
    }

    pub fn find(&self, id: &str) -> Option<&Seat> {
        self.seats().find(|s| s.id == id)
    }

    pub fn capacity(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn available_ids(&self) -> Vec<String> {
        self.seats().filter(|s| !s.booked).map(|s| s.id.clone()).collect()
    }

    /// Проверяет выбор покупателя и проставляет тип места по схеме зала.
    /// Категория ряда главнее того, что прислал клиент.
    pub fn resolve(&self, requested: &[SeatSelection]) -> Result<Vec<SeatSelection>, SeatMapError> {
        if requested.is_empty() {
            return Err(SeatMapError::EmptySelection);
        }
        let mut seen = HashSet::new();
        requested
            .iter()
            .map(|sel| {
                let seat = self
                    .find(&sel.seat)
                    .ok_or_else(|| SeatMapError::UnknownSeat(sel.seat.clone()))?;
                if !seen.insert(seat.id.as_str()) {
                    return Err(SeatMapError::DuplicateSeat(seat.id.clone()));
                }
                if seat.booked {
                    return Err(SeatMapError::AlreadyBooked(seat.id.clone()));
                }
                Ok(SeatSelection::new(seat.id.clone(), seat.category.clone()))
            })
            .collect()
    }
}

/// Разбор строки вида "A1:VIP,B3:VIP,C4:REG"
pub fn parse_seat_data(data: &str) -> Vec<SeatSelection> {
    data.split(',')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, ':');
            let seat = parts.next()?.trim();
            if seat.is_empty() {
                return None;
            }
            let type_code = parts
                .next()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(FALLBACK_TYPE);
            Some(SeatSelection::new(seat, type_code))
        })
        .collect()
}

pub fn format_seat_data(selections: &[SeatSelection]) -> String {
    selections
        .iter()
        .map(|s| format!("{}:{}", s.seat, s.type_code))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedSeat {
    pub id: String,
    #[serde(rename = "type")]
    pub type_code: String,
    pub price: i64,
}

/// Текущий выбор мест в схеме зала
#[derive(Debug, Clone, Default)]
pub struct Selection {
    selected: Vec<String>,
}

impl Selection {
    pub fn ids(&self) -> &[String] {
        &self.selected
    }

    /// Занятые места выбрать нельзя; повторный клик снимает выбор
    pub fn toggle(&mut self, seat: &Seat) {
        if seat.booked {
            return;
        }
        if let Some(idx) = self.selected.iter().position(|id| *id == seat.id) {
            self.selected.remove(idx);
        } else {
            self.selected.push(seat.id.clone());
        }
    }

    pub fn select_all(&mut self, map: &SeatMap) {
        self.selected = map.available_ids();
    }

    pub fn details(&self, map: &SeatMap, table: &CategoryTable) -> Vec<SelectedSeat> {
        self.selected
            .iter()
            .map(|id| {
                let type_code = map
                    .find(id)
                    .map(|s| s.category.clone())
                    .unwrap_or_else(|| FALLBACK_TYPE.to_string());
                let price = table.get(&type_code).map(|c| c.price).unwrap_or(0);
                SelectedSeat { id: id.clone(), type_code, price }
            })
            .collect()
    }

    pub fn total_price(&self, map: &SeatMap, table: &CategoryTable) -> i64 {
        self.details(map, table).iter().map(|s| s.price).sum()
    }

    /// Строка для перехода к оформлению заказа
    pub fn to_seat_data(&self, map: &SeatMap) -> Result<String, SeatMapError> {
        if self.selected.is_empty() {
            return Err(SeatMapError::EmptySelection);
        }
        let selections: Vec<SeatSelection> = self
            .selected
            .iter()
            .map(|id| {
                let type_code = map.find(id).map(|s| s.category.as_str()).unwrap_or(FALLBACK_TYPE);
                SeatSelection::new(id.as_str(), type_code)
            })
            .collect();
        Ok(format_seat_data(&selections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Vec<SeatConfigEntry> {
        vec![
            SeatConfigEntry { row: "A".into(), category: "VIP".into() },
            SeatConfigEntry { row: "B".into(), category: "REG".into() },
        ]
    }

    fn categories() -> Vec<TicketCategory> {
        vec![
            TicketCategory { name: "VIP".into(), short_name: "VIP".into(), price: 65_000 },
            TicketCategory { name: "General Admission".into(), short_name: "REG".into(), price: 45_000 },
        ]
    }

    #[test]
    fn grid_has_fifteen_rows_of_thirty() {
        let map = generate(&[], &[]);
        assert_eq!(map.rows().len(), 15);
        assert_eq!(map.capacity(), 450);
        assert_eq!(map.lower_foyer().len(), 10);
        assert_eq!(map.balcony().len(), 5);
        assert_eq!(map.balcony()[0][0].id, "AA1");
        assert_eq!(map.lower_foyer()[9][29].id, "J30");
    }

    #[test]
    fn unconfigured_event_uses_general_category() {
        let map = generate(&[], &[]);
        assert!(map.seats().all(|s| s.category == DEFAULT_CATEGORY));
        let table = category_table(&[]);
        assert_eq!(table["GEN"].price, 25_000);
        assert_eq!(table["GEN"].name, "General");
    }

    #[test]
    fn configured_rows_get_their_category_and_others_fall_back() {
        let map = generate(&config(), &[]);
        assert_eq!(map.find("A5").unwrap().category, "VIP");
        assert_eq!(map.find("B5").unwrap().category, "REG");
        assert_eq!(map.find("CC5").unwrap().category, "GEN");
    }

    #[test]
    fn booked_seats_are_flagged_and_not_selectable() {
        let map = generate(&config(), &["A1".to_string()]);
        let booked = map.find("A1").unwrap();
        assert!(booked.booked);

        let mut selection = Selection::default();
        selection.toggle(booked);
        assert!(selection.ids().is_empty());

        let free = map.find("A2").unwrap();
        selection.toggle(free);
        assert_eq!(selection.ids(), ["A2".to_string()]);
        selection.toggle(free);
        assert!(selection.ids().is_empty());
    }

    #[test]
    fn select_all_skips_booked() {
        let map = generate(&[], &["A1".to_string(), "EE30".to_string()]);
        let mut selection = Selection::default();
        selection.select_all(&map);
        assert_eq!(selection.ids().len(), 448);
    }

    #[test]
    fn selection_details_and_total_use_category_prices() {
        let map = generate(&config(), &[]);
        let table = category_table(&categories());
        let mut selection = Selection::default();
        selection.toggle(map.find("A1").unwrap());
        selection.toggle(map.find("B1").unwrap());
        selection.toggle(map.find("C1").unwrap());

        let details = selection.details(&map, &table);
        assert_eq!(details[0], SelectedSeat { id: "A1".into(), type_code: "VIP".into(), price: 65_000 });
        // GEN нет в таблице категорий события
        assert_eq!(details[2].price, 0);
        assert_eq!(selection.total_price(&map, &table), 110_000);
        assert_eq!(selection.to_seat_data(&map).unwrap(), "A1:VIP,B1:REG,C1:GEN");
    }

    #[test]
    fn continuing_without_seats_is_rejected() {
        let map = generate(&[], &[]);
        assert_eq!(Selection::default().to_seat_data(&map), Err(SeatMapError::EmptySelection));
    }

    #[test]
    fn seat_data_parsing_trims_and_defaults_type() {
        let parsed = parse_seat_data(" A1:VIP, B3 ,,C4: ");
        assert_eq!(
            parsed,
            vec![
                SeatSelection::new("A1", "VIP"),
                SeatSelection::new("B3", "REG"),
                SeatSelection::new("C4", "REG"),
            ]
        );
        assert_eq!(format_seat_data(&parsed), "A1:VIP,B3:REG,C4:REG");
        assert!(parse_seat_data("").is_empty());
    }

    #[test]
    fn resolve_rejects_unknown_duplicate_and_booked() {
        let map = generate(&config(), &["A3".to_string()]);
        assert_eq!(
            map.resolve(&[SeatSelection::regular("Z1")]),
            Err(SeatMapError::UnknownSeat("Z1".into()))
        );
        assert_eq!(
            map.resolve(&[SeatSelection::regular("A1"), SeatSelection::regular("A1")]),
            Err(SeatMapError::DuplicateSeat("A1".into()))
        );
        assert_eq!(
            map.resolve(&[SeatSelection::regular("A3")]),
            Err(SeatMapError::AlreadyBooked("A3".into()))
        );
        assert_eq!(map.resolve(&[]), Err(SeatMapError::EmptySelection));

        let resolved = map.resolve(&[SeatSelection::new("A1", "CHD")]).unwrap();
        assert_eq!(resolved, vec![SeatSelection::new("A1", "VIP")]);
    }

    #[test]
    fn seat_ids_are_validated() {
        assert_eq!(split_seat_id("BB12"), Some(("BB", 12)));
        assert_eq!(split_seat_id("A30"), Some(("A", 30)));
        assert_eq!(split_seat_id("A31"), None);
        assert_eq!(split_seat_id("K1"), None);
        assert_eq!(split_seat_id("A"), None);
    }

    #[test]
    fn available_seats_never_negative() {
        assert_eq!(available_seats(2, 10), 50);
        assert_eq!(available_seats(0, 3), 0);
    }
}
