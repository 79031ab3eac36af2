use serde::Deserialize;
use std::env;
use std::str::FromStr;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub booking: BookingConfig,
    pub payment: PaymentConfig,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: String,
    pub cleanup_interval_seconds: u64,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Настройки JWT (сессии пользователей)
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
}

// Правила бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub cancellation_window_days: i64,
    pub seat_hold_seconds: u64,
    pub waitlist_capacity: i64,
}

// Симуляция оплаты и подпись электронных билетов
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub delay_ms: u64,
    pub eticket_secret: String,
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub enable_analytics: bool,
    pub enable_waitlist: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Читает настройки из произвольного источника переменных.
struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        (self.lookup)(name)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(name))
    }

    fn or(&self, name: &'static str, default: &str) -> String {
        (self.lookup)(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, name: &'static str, default: &str) -> Result<T, ConfigError> {
        let value = self.or(name, default);
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value })
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let src = Source { lookup };

        Ok(Config {
            app: AppConfig {
                host: src.or("HOST", "0.0.0.0"),
                port: src.parsed("PORT", "8000")?,
                environment: src.or("ENVIRONMENT", "development"),
                rust_log: src.or("RUST_LOG", "event_tickets=debug,tower_http=debug"),
                log_format: src.or("LOG_FORMAT", "pretty"),
                cleanup_interval_seconds: src.parsed("CLEANUP_INTERVAL_SECONDS", "300")?,
            },
            database: DatabaseConfig {
                url: src.required("DATABASE_URL")?,
                pool_size: src.parsed("DB_POOL_SIZE", "20")?,
            },
            redis: RedisConfig {
                url: src.required("REDIS_URL")?,
            },
            jwt: JwtConfig {
                secret: src.required("JWT_SECRET")?,
                expires_in_hours: src.parsed("JWT_EXPIRES_IN_HOURS", "24")?,
            },
            booking: BookingConfig {
                cancellation_window_days: src.parsed("CANCELLATION_WINDOW_DAYS", "7")?,
                seat_hold_seconds: src.parsed("SEAT_HOLD_SECONDS", "300")?,
                waitlist_capacity: src.parsed("WAITLIST_CAPACITY", "5")?,
            },
            payment: PaymentConfig {
                delay_ms: src.parsed("PAYMENT_DELAY_MS", "600")?,
                eticket_secret: src.required("ETICKET_SECRET")?,
            },
            features: FeatureFlags {
                enable_analytics: src.parsed("ENABLE_ANALYTICS", "true")?,
                enable_waitlist: src.parsed("ENABLE_WAITLIST", "true")?,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/tickets"),
            ("REDIS_URL", "redis://localhost"),
            ("JWT_SECRET", "secret"),
            ("ETICKET_SECRET", "eticket"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = load(&base_vars()).unwrap();
        assert_eq!(cfg.app.port, 8000);
        assert_eq!(cfg.database.pool_size, 20);
        assert_eq!(cfg.booking.cancellation_window_days, 7);
        assert_eq!(cfg.booking.seat_hold_seconds, 300);
        assert_eq!(cfg.booking.waitlist_capacity, 5);
        assert_eq!(cfg.payment.delay_ms, 600);
        assert!(cfg.features.enable_analytics);
        assert!(!cfg.is_production());
    }

    #[test]
    fn missing_required_variable_is_reported() {
        let mut vars = base_vars();
        vars.remove("JWT_SECRET");
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn unparsable_number_is_reported() {
        let mut vars = base_vars();
        vars.insert("PORT", "eighty");
        let err = load(&vars).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid { name: "PORT", value: "eighty".to_string() }
        );
    }

    #[test]
    fn overrides_are_read() {
        let mut vars = base_vars();
        vars.insert("ENVIRONMENT", "Production");
        vars.insert("ENABLE_WAITLIST", "false");
        vars.insert("WAITLIST_CAPACITY", "12");
        let cfg = load(&vars).unwrap();
        assert!(cfg.is_production());
        assert!(!cfg.features.enable_waitlist);
        assert_eq!(cfg.booking.waitlist_capacity, 12);
    }
}
