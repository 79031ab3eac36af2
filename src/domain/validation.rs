//! Проверка форм: регистрация, вход, событие, лист ожидания, сброс пароля.
//!
//! Формат и длины проверяет `validator`, бизнес-правила (обязательные поля,
//! сетка рядов, промокоды) проверяются вручную. Наружу отдаётся одно
//! сообщение, как в алертах браузерного клиента.

use base64::{engine::general_purpose, Engine as _};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::collections::HashSet;
use validator::{Validate, ValidateEmail, ValidationErrors};

use super::seat_map;
use crate::models::{PromoCode, Role, SeatConfigEntry, TicketCategory};

pub const ALL_FIELDS_REQUIRED: &str = "All fields are required!";
pub const DATE_TAKEN: &str = "There is already an ongoing event on that date.";
pub const EMAIL_TAKEN: &str = "This email is already registered, please use a different email.";
pub const WAITLIST_FULL: &str = "The waitlist is currently full. Please try again later.";

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("{0}")]
pub struct Invalid(pub String);

impl Invalid {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Первое сообщение из ошибок `validator`, поля в алфавитном порядке
pub fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(_, errs)| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string())
}

fn run(form: &impl Validate) -> Result<(), Invalid> {
    form.validate().map_err(|e| Invalid(first_message(&e)))
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

// --- Регистрация и вход ---

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters."))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Password confirmation does not match."))]
    pub confirm_password: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
}

impl SignupRequest {
    /// Возвращает роль нового пользователя (по умолчанию attendee)
    pub fn check(&self) -> Result<Role, Invalid> {
        if [&self.name, &self.email, &self.password, &self.confirm_password]
            .iter()
            .any(|f| blank(f))
        {
            return Err(Invalid::new(ALL_FIELDS_REQUIRED));
        }
        run(self)?;
        match self.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            None => Ok(Role::default()),
            Some(role) => role
                .parse()
                .map_err(|_| Invalid::new(format!("Unknown role '{role}'"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn check(&self) -> Result<(), Invalid> {
        if blank(&self.email) || self.password.is_empty() {
            return Err(Invalid::new("Email and password are required!"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneLoginRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
}

impl PhoneLoginRequest {
    pub fn check(&self) -> Result<(), Invalid> {
        if blank(&self.phone) || self.password.is_empty() {
            return Err(Invalid::new("Phone number and password are required!"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn check(&self) -> Result<(), Invalid> {
        if blank(&self.email) {
            return Err(Invalid::new("Please enter your email address."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters."))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub confirm_password: String,
}

impl ResetPasswordRequest {
    pub fn check(&self, token: &str) -> Result<(), Invalid> {
        if blank(token) {
            return Err(Invalid::new("Reset token is required."));
        }
        if self.password.is_empty() || self.confirm_password.is_empty() {
            return Err(Invalid::new("Please enter and confirm your new password."));
        }
        run(self)
    }
}

// --- События ---

#[derive(Debug, Clone, Deserialize)]
pub struct EventForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub poster: Option<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_special: bool,
    #[serde(default)]
    pub ticket_categories: Vec<TicketCategory>,
    #[serde(default)]
    pub seat_configuration: Vec<SeatConfigEntry>,
    #[serde(default)]
    pub promo_codes: Vec<PromoCode>,
}

/// Проверенная форма события
#[derive(Debug, Clone)]
pub struct ValidEvent {
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub location: String,
    pub description: String,
    pub poster: Option<String>,
    pub is_new: bool,
    pub is_special: bool,
    pub ticket_categories: Vec<TicketCategory>,
    pub seat_configuration: Vec<SeatConfigEntry>,
    pub promo_codes: Vec<PromoCode>,
}

impl EventForm {
    pub fn check(self) -> Result<ValidEvent, Invalid> {
        if [&self.title, &self.location, &self.date, &self.time, &self.description]
            .iter()
            .any(|f| blank(f))
        {
            return Err(Invalid::new(
                "Please fill in all required fields: Title, Location, Date, Time, and Description.",
            ));
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| Invalid::new("Date must be in YYYY-MM-DD format."))?;
        let time = NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .map_err(|_| Invalid::new("Time must be in HH:MM format."))?;

        let poster = match self.poster.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(data) => {
                check_poster(data)?;
                Some(data.to_string())
            }
        };

        check_categories(&self.ticket_categories)?;
        check_seat_configuration(&self.seat_configuration, &self.ticket_categories)?;
        check_promo_codes(&self.promo_codes, &self.ticket_categories)?;

        Ok(ValidEvent {
            title: self.title.trim().to_string(),
            date,
            time: time.format("%H:%M").to_string(),
            location: self.location.trim().to_string(),
            description: self.description.trim().to_string(),
            poster,
            is_new: self.is_new,
            is_special: self.is_special,
            ticket_categories: self.ticket_categories,
            seat_configuration: self.seat_configuration,
            promo_codes: self.promo_codes,
        })
    }
}

/// Постер хранится как data URL: `data:image/png;base64,....`
pub fn check_poster(data: &str) -> Result<(), Invalid> {
    let err = || Invalid::new("Could not read event poster file.");
    let rest = data.strip_prefix("data:").ok_or_else(err)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(err)?;
    if !meta.starts_with("image/") || !meta.ends_with(";base64") {
        return Err(err());
    }
    general_purpose::STANDARD.decode(payload).map_err(|_| err())?;
    Ok(())
}

pub fn check_categories(categories: &[TicketCategory]) -> Result<(), Invalid> {
    let mut seen = HashSet::new();
    for c in categories {
        if blank(&c.name) || blank(&c.short_name) {
            return Err(Invalid::new("Ticket categories need a name and a short name."));
        }
        if c.price < 0 {
            return Err(Invalid::new(format!("Price of category {} cannot be negative.", c.short_name)));
        }
        if !seen.insert(c.short_name.as_str()) {
            return Err(Invalid::new(format!("Duplicate category short name {}.", c.short_name)));
        }
    }
    Ok(())
}

pub fn check_seat_configuration(
    config: &[SeatConfigEntry],
    categories: &[TicketCategory],
) -> Result<(), Invalid> {
    let table = seat_map::category_table(categories);
    let mut rows = HashSet::new();
    for entry in config {
        if !seat_map::is_valid_row(&entry.row) {
            return Err(Invalid::new(format!("Row {} does not exist.", entry.row)));
        }
        if !rows.insert(entry.row.as_str()) {
            return Err(Invalid::new(format!("Row {} is configured twice.", entry.row)));
        }
        if !table.contains_key(&entry.category) {
            return Err(Invalid::new(format!(
                "Row {} uses unknown category {}.",
                entry.row, entry.category
            )));
        }
    }
    Ok(())
}

pub fn check_promo_codes(promos: &[PromoCode], categories: &[TicketCategory]) -> Result<(), Invalid> {
    let table = seat_map::category_table(categories);
    let mut seen = HashSet::new();
    for p in promos {
        if blank(&p.code) {
            return Err(Invalid::new("Promo code cannot be empty."));
        }
        if !(p.discount > 0.0 && p.discount <= 100.0) {
            return Err(Invalid::new(format!(
                "Discount of promo {} must be between 0 and 100 percent.",
                p.code
            )));
        }
        if !seen.insert(p.code.to_ascii_uppercase()) {
            return Err(Invalid::new(format!("Duplicate promo code {}.", p.code)));
        }
        if let Some(unknown) = p.applicable_categories.iter().find(|c| !table.contains_key(*c)) {
            return Err(Invalid::new(format!(
                "Promo {} refers to unknown category {}.",
                p.code, unknown
            )));
        }
    }
    Ok(())
}

// --- Лист ожидания ---

#[derive(Debug, Clone, Deserialize)]
pub struct WaitlistRequest {
    pub event_id: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Контакты для листа ожидания после нормализации
#[derive(Debug, Clone, PartialEq)]
pub struct WaitlistContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl WaitlistRequest {
    pub fn check(&self) -> Result<WaitlistContact, Invalid> {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let contact = WaitlistContact { email: clean(&self.email), phone: clean(&self.phone) };
        if contact.email.is_none() && contact.phone.is_none() {
            return Err(Invalid::new(
                "Please provide at least one contact method (email or phone number).",
            ));
        }
        if let Some(email) = &contact.email {
            if !email.validate_email() {
                return Err(Invalid::new("Please enter a valid email address."));
            }
        }
        Ok(contact)
    }
}

pub fn waitlist_full(count: i64, capacity: i64) -> bool {
    count >= capacity
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::internet::en::{Password, SafeEmail};
    use fake::faker::name::en::Name;
    use fake::Fake;

    fn signup() -> SignupRequest {
        let password: String = Password(8..16).fake();
        SignupRequest {
            name: Name().fake(),
            email: SafeEmail().fake(),
            password: password.clone(),
            confirm_password: password,
            role: None,
            phone: None,
            organization: None,
        }
    }

    #[test]
    fn generated_signup_is_accepted_as_attendee() {
        assert_eq!(signup().check(), Ok(Role::Attendee));
    }

    #[test]
    fn signup_rules() {
        let mut s = signup();
        s.name = "  ".into();
        assert_eq!(s.check(), Err(Invalid::new(ALL_FIELDS_REQUIRED)));

        let mut s = signup();
        s.password = "12345".into();
        s.confirm_password = "12345".into();
        assert_eq!(s.check(), Err(Invalid::new("Password must be at least 6 characters.")));

        let mut s = signup();
        s.confirm_password = "something-else".into();
        assert_eq!(s.check(), Err(Invalid::new("Password confirmation does not match.")));

        let mut s = signup();
        s.email = "not-an-email".into();
        assert_eq!(s.check(), Err(Invalid::new("Please enter a valid email address.")));

        let mut s = signup();
        s.role = Some("organizer".into());
        assert_eq!(s.check(), Ok(Role::Organizer));

        s.role = Some("superuser".into());
        assert!(s.check().is_err());
    }

    #[test]
    fn login_requires_both_fields() {
        let login = LoginRequest { email: "a@b.c".into(), password: String::new() };
        assert_eq!(login.check(), Err(Invalid::new("Email and password are required!")));
        let phone = PhoneLoginRequest { phone: " ".into(), password: "secret".into() };
        assert_eq!(phone.check(), Err(Invalid::new("Phone number and password are required!")));
    }

    #[test]
    fn reset_password_rules() {
        let req = ResetPasswordRequest { password: "abcdef".into(), confirm_password: "abcdeg".into() };
        assert_eq!(req.check("tok"), Err(Invalid::new("Passwords do not match.")));
        assert_eq!(req.check(""), Err(Invalid::new("Reset token is required.")));

        let empty = ResetPasswordRequest { password: String::new(), confirm_password: String::new() };
        assert_eq!(
            empty.check("tok"),
            Err(Invalid::new("Please enter and confirm your new password."))
        );

        let ok = ResetPasswordRequest { password: "abcdef".into(), confirm_password: "abcdef".into() };
        assert_eq!(ok.check("tok"), Ok(()));
    }

    fn event_form() -> EventForm {
        EventForm {
            title: "Digital Innovation Conference".into(),
            date: "2025-03-10".into(),
            time: "9:00".into(),
            location: "Main Auditorium".into(),
            description: "Future of technology".into(),
            poster: Some("data:image/png;base64,iVBORw0KGgo=".into()),
            is_new: true,
            is_special: false,
            ticket_categories: vec![
                TicketCategory { name: "VIP".into(), short_name: "VIP".into(), price: 65_000 },
                TicketCategory { name: "General Admission".into(), short_name: "REG".into(), price: 45_000 },
            ],
            seat_configuration: vec![
                SeatConfigEntry { row: "A".into(), category: "VIP".into() },
                SeatConfigEntry { row: "AA".into(), category: "REG".into() },
            ],
            promo_codes: vec![PromoCode {
                code: "EARLY".into(),
                discount: 15.0,
                expiry: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                applicable_categories: vec!["VIP".into()],
            }],
        }
    }

    #[test]
    fn valid_event_is_normalized() {
        let event = event_form().check().unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(event.time, "09:00");
        assert!(event.poster.is_some());
    }

    #[test]
    fn event_requires_fields_and_formats() {
        let mut f = event_form();
        f.description.clear();
        assert!(f.check().unwrap_err().0.starts_with("Please fill in all required fields"));

        let mut f = event_form();
        f.date = "10/03/2025".into();
        assert!(f.check().is_err());

        let mut f = event_form();
        f.time = "25:00".into();
        assert!(f.check().is_err());
    }

    #[test]
    fn poster_must_be_base64_image() {
        assert!(check_poster("data:image/jpeg;base64,/9j/4AAQ").is_ok());
        assert!(check_poster("https://example.com/poster.png").is_err());
        assert!(check_poster("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(check_poster("data:image/png;base64,***").is_err());
    }

    #[test]
    fn categories_rows_and_promos_are_consistent() {
        let mut f = event_form();
        f.ticket_categories[1].short_name = "VIP".into();
        assert!(f.check().unwrap_err().0.contains("Duplicate category"));

        let mut f = event_form();
        f.seat_configuration.push(SeatConfigEntry { row: "Z".into(), category: "VIP".into() });
        assert_eq!(f.check().unwrap_err().0, "Row Z does not exist.");

        let mut f = event_form();
        f.seat_configuration.push(SeatConfigEntry { row: "B".into(), category: "CHD".into() });
        assert!(f.check().unwrap_err().0.contains("unknown category CHD"));

        let mut f = event_form();
        f.promo_codes[0].discount = 0.0;
        assert!(f.check().is_err());
        let mut f = event_form();
        f.promo_codes[0].discount = 100.0;
        assert!(f.check().is_ok());
    }

    #[test]
    fn rows_default_to_general_without_categories() {
        let config = vec![SeatConfigEntry { row: "C".into(), category: "GEN".into() }];
        assert!(check_seat_configuration(&config, &[]).is_ok());
    }

    #[test]
    fn waitlist_contact_rules() {
        let req = WaitlistRequest { event_id: 1, email: Some(" ".into()), phone: None };
        assert!(req.check().unwrap_err().0.starts_with("Please provide at least one contact"));

        let req = WaitlistRequest { event_id: 1, email: None, phone: Some(" 555-0100 ".into()) };
        assert_eq!(
            req.check().unwrap(),
            WaitlistContact { email: None, phone: Some("555-0100".into()) }
        );

        assert!(waitlist_full(5, 5));
        assert!(!waitlist_full(4, 5));
    }
}
