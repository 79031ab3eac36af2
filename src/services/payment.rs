//! payment.rs
//!
//! Симуляция оплаты и выпуск кода электронного билета.
//!
//! Реального шлюза нет: `PaymentSimulator` ждёт настроенную задержку,
//! как если бы ждал ответа банка, и выдаёт ссылку `PAY-<uuid>`.
//! Код e-ticket строится из SHA-256 по id билета, местам и секрету сервера.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tokio::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::PaymentConfig;

/// Способы оплаты на странице checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "creditCard")]
    CreditCard,
    #[serde(rename = "eWallet")]
    EWallet,
    #[serde(rename = "bankTransfer")]
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "creditCard",
            PaymentMethod::EWallet => "eWallet",
            PaymentMethod::BankTransfer => "bankTransfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PaymentError {
    #[error("Unsupported payment method '{0}'")]
    UnsupportedMethod(String),
    #[error("Payment amount cannot be negative")]
    NegativeAmount,
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creditCard" => Ok(PaymentMethod::CreditCard),
            "eWallet" => Ok(PaymentMethod::EWallet),
            "bankTransfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(PaymentError::UnsupportedMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub reference: String,
    pub method: PaymentMethod,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct PaymentSimulator {
    delay: Duration,
}

impl PaymentSimulator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_config(config: &PaymentConfig) -> Self {
        Self::new(Duration::from_millis(config.delay_ms))
    }

    /// "Списывает" сумму. Нулевая сумма допустима (скидка 100%).
    pub async fn charge(&self, method: PaymentMethod, amount: i64) -> Result<PaymentReceipt, PaymentError> {
        if amount < 0 {
            return Err(PaymentError::NegativeAmount);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reference = format!("PAY-{}", Uuid::new_v4());
        info!("Simulated {} payment of {} accepted: {}", method, amount, reference);
        Ok(PaymentReceipt { reference, method, amount })
    }
}

/// Первые 16 hex-символов SHA-256("id|A1,A2|secret") в верхнем регистре
pub fn eticket_code(ticket_id: i64, seats: &[String], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", ticket_id, seats.join(","), secret).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn charge_returns_reference() {
        let sim = PaymentSimulator::new(Duration::ZERO);
        let receipt = sim.charge(PaymentMethod::EWallet, 97_000).await.unwrap();
        assert!(receipt.reference.starts_with("PAY-"));
        assert_eq!(receipt.reference.len(), 4 + 36);
        assert_eq!(receipt.amount, 97_000);
    }

    #[tokio::test]
    async fn free_orders_are_allowed_negative_are_not() {
        let sim = PaymentSimulator::new(Duration::ZERO);
        assert!(sim.charge(PaymentMethod::CreditCard, 0).await.is_ok());
        assert_eq!(
            sim.charge(PaymentMethod::CreditCard, -1).await.unwrap_err(),
            PaymentError::NegativeAmount
        );
    }

    #[tokio::test]
    async fn charge_waits_configured_delay() {
        let sim = PaymentSimulator::new(Duration::from_millis(20));
        let started = tokio::time::Instant::now();
        sim.charge(PaymentMethod::BankTransfer, 1).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn method_names_match_checkout_form() {
        assert_eq!("eWallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::EWallet);
        assert_eq!(serde_json::to_value(PaymentMethod::BankTransfer).unwrap(), "bankTransfer");
        assert!("cash".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn eticket_code_is_stable_and_secret_dependent() {
        let seats = vec!["A1".to_string(), "A2".to_string()];
        let a = eticket_code(10, &seats, "s1");
        assert_eq!(a, eticket_code(10, &seats, "s1"));
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(a, eticket_code(10, &seats, "s2"));
        assert_ne!(a, eticket_code(11, &seats, "s1"));
    }
}
