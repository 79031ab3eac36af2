//! pricing.rs
//!
//! Расчёт стоимости заказа: цена каждого места по таблице категорий,
//! применение промокода (процент, срок действия, категории) и итог.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::seat_map::SeatSelection;
use crate::models::PromoCode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPrice {
    pub name: String,
    pub price: i64,
}

/// short_name -> {name, price}
pub type CategoryTable = BTreeMap<String, CategoryPrice>;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PromoError {
    #[error("Promo code '{0}' is not valid for this event")]
    Unknown(String),
    #[error("Promo code '{0}' has expired")]
    Expired(String),
    #[error("Promo code '{0}' does not apply to the selected seats")]
    NotApplicable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteLine {
    pub seat: String,
    pub type_code: String,
    pub label: String,
    pub price: i64,
    pub discounted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedPromo {
    pub code: String,
    pub discount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
    pub applied_promo: Option<AppliedPromo>,
}

pub fn type_price(table: &CategoryTable, code: &str) -> i64 {
    table.get(code).map(|c| c.price).unwrap_or(0)
}

pub fn type_label(table: &CategoryTable, code: &str) -> String {
    table.get(code).map(|c| c.name.clone()).unwrap_or_else(|| code.to_string())
}

/// Ищет промокод события без учёта регистра и проверяет срок действия
pub fn find_promo<'a>(
    promos: &'a [PromoCode],
    code: &str,
    today: NaiveDate,
) -> Result<&'a PromoCode, PromoError> {
    let code = code.trim();
    let promo = promos
        .iter()
        .find(|p| p.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| PromoError::Unknown(code.to_string()))?;
    if promo.expiry < today {
        return Err(PromoError::Expired(promo.code.clone()));
    }
    Ok(promo)
}

fn applies_to(promo: &PromoCode, type_code: &str) -> bool {
    promo.applicable_categories.is_empty()
        || promo
            .applicable_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(type_code))
}

/// Считает итог заказа. `promo_code` пустой строкой считается отсутствующим.
pub fn quote(
    selections: &[SeatSelection],
    table: &CategoryTable,
    promos: &[PromoCode],
    promo_code: Option<&str>,
    today: NaiveDate,
) -> Result<Quote, PromoError> {
    let promo = match promo_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Some(find_promo(promos, code, today)?),
        None => None,
    };

    let lines: Vec<QuoteLine> = selections
        .iter()
        .map(|s| QuoteLine {
            seat: s.seat.clone(),
            type_code: s.type_code.clone(),
            label: type_label(table, &s.type_code),
            price: type_price(table, &s.type_code),
            discounted: promo.is_some_and(|p| applies_to(p, &s.type_code)),
        })
        .collect();

    let subtotal: i64 = lines.iter().map(|l| l.price).sum();

    let (discount_amount, applied_promo) = match promo {
        Some(p) => {
            if !lines.iter().any(|l| l.discounted) {
                return Err(PromoError::NotApplicable(p.code.clone()));
            }
            let eligible: i64 = lines.iter().filter(|l| l.discounted).map(|l| l.price).sum();
            let discount = ((eligible as f64) * p.discount / 100.0).round() as i64;
            (
                discount.clamp(0, subtotal),
                Some(AppliedPromo { code: p.code.clone(), discount: p.discount }),
            )
        }
        None => (0, None),
    };

    Ok(Quote {
        lines,
        subtotal,
        discount_amount,
        total: (subtotal - discount_amount).max(0),
        applied_promo,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> CategoryTable {
        BTreeMap::from([
            ("VIP".to_string(), CategoryPrice { name: "VIP".into(), price: 65_000 }),
            ("REG".to_string(), CategoryPrice { name: "General Admission".into(), price: 45_000 }),
            ("CHD".to_string(), CategoryPrice { name: "Children".into(), price: 25_000 }),
        ])
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn promos() -> Vec<PromoCode> {
        vec![
            PromoCode {
                code: "VIPONLY".into(),
                discount: 20.0,
                expiry: day(2025, 12, 31),
                applicable_categories: vec!["VIP".into()],
            },
            PromoCode {
                code: "ALL10".into(),
                discount: 10.0,
                expiry: day(2025, 6, 1),
                applicable_categories: vec![],
            },
        ]
    }

    fn seats() -> Vec<SeatSelection> {
        vec![
            SeatSelection::new("A1", "VIP"),
            SeatSelection::new("B1", "REG"),
            SeatSelection::new("C1", "XYZ"),
        ]
    }

    #[test]
    fn quote_without_promo_sums_prices() {
        let q = quote(&seats(), &table(), &promos(), None, day(2025, 1, 1)).unwrap();
        assert_eq!(q.subtotal, 110_000);
        assert_eq!(q.discount_amount, 0);
        assert_eq!(q.total, 110_000);
        assert_eq!(q.lines[2].label, "XYZ");
        assert_eq!(q.lines[2].price, 0);
        assert!(q.applied_promo.is_none());
    }

    #[test]
    fn blank_promo_is_ignored() {
        let q = quote(&seats(), &table(), &promos(), Some("  "), day(2025, 1, 1)).unwrap();
        assert_eq!(q.total, 110_000);
    }

    #[test]
    fn promo_applies_only_to_listed_categories() {
        let q = quote(&seats(), &table(), &promos(), Some("viponly"), day(2025, 1, 1)).unwrap();
        assert_eq!(q.discount_amount, 13_000);
        assert_eq!(q.total, 97_000);
        assert!(q.lines[0].discounted);
        assert!(!q.lines[1].discounted);
        assert_eq!(q.applied_promo.unwrap().code, "VIPONLY");
    }

    #[test]
    fn promo_without_categories_applies_to_everything() {
        let q = quote(&seats(), &table(), &promos(), Some("ALL10"), day(2025, 6, 1)).unwrap();
        assert_eq!(q.discount_amount, 11_000);
        assert_eq!(q.total, 99_000);
    }

    #[test]
    fn expired_unknown_and_inapplicable_promos_are_rejected() {
        assert_eq!(
            quote(&seats(), &table(), &promos(), Some("ALL10"), day(2025, 6, 2)),
            Err(PromoError::Expired("ALL10".into()))
        );
        assert_eq!(
            quote(&seats(), &table(), &promos(), Some("NOPE"), day(2025, 1, 1)),
            Err(PromoError::Unknown("NOPE".into()))
        );
        let reg_only = vec![SeatSelection::new("B2", "REG")];
        assert_eq!(
            quote(&reg_only, &table(), &promos(), Some("VIPONLY"), day(2025, 1, 1)),
            Err(PromoError::NotApplicable("VIPONLY".into()))
        );
    }

    proptest! {
        #[test]
        fn total_is_subtotal_minus_bounded_discount(
            codes in proptest::collection::vec(proptest::sample::select(vec!["VIP", "REG", "CHD", "GEN"]), 1..40),
            percent in 0.5f64..=100.0,
        ) {
            let selections: Vec<SeatSelection> = codes
                .iter()
                .enumerate()
                .map(|(i, c)| SeatSelection::new(format!("A{}", i + 1), *c))
                .collect();
            let promos = vec![PromoCode {
                code: "P".into(),
                discount: percent,
                expiry: day(2030, 1, 1),
                applicable_categories: vec![],
            }];
            let q = quote(&selections, &table(), &promos, Some("P"), day(2025, 1, 1)).unwrap();
            prop_assert!(q.discount_amount >= 0);
            prop_assert!(q.discount_amount <= q.subtotal);
            prop_assert_eq!(q.total, q.subtotal - q.discount_amount);
        }
    }
}
