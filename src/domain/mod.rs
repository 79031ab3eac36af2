//! Чистая бизнес-логика без БД и сети.

pub mod policy;
pub mod pricing;
pub mod reports;
pub mod seat_map;
pub mod validation;
