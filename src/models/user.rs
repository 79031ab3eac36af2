use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::database::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Attendee,
    Organizer,
    AuditoriumAdmin,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Attendee => "attendee",
            Role::Organizer => "organizer",
            Role::AuditoriumAdmin => "auditorium_admin",
        }
    }

    /// Куда фронтенд отправляет пользователя после входа
    pub fn landing_page(&self) -> &'static str {
        match self {
            Role::Organizer => "/dashboard",
            Role::AuditoriumAdmin => "/admin-dashboard",
            Role::Attendee => "/home",
        }
    }

    pub fn can_manage_events(&self) -> bool {
        matches!(self, Role::Organizer | Role::AuditoriumAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attendee" => Ok(Role::Attendee),
            "organizer" => Ok(Role::Organizer),
            "auditorium_admin" => Ok(Role::AuditoriumAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, phone, organization, created_at";

impl User {
    // Найти пользователя по email
    pub async fn find_by_email(email: &str, db: &Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&db.pool)
            .await
    }

    // Найти пользователя по телефону (вход по номеру)
    pub async fn find_by_phone(phone: &str, db: &Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1"))
            .bind(phone)
            .fetch_optional(&db.pool)
            .await
    }

    pub async fn find_by_id(id: i64, db: &Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&db.pool)
            .await
    }

    pub async fn insert(
        db: &Database,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        phone: Option<&str>,
        organization: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, role, phone, organization)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(phone)
        .bind(organization)
        .fetch_one(&db.pool)
        .await
    }

    pub async fn update_password(db: &Database, email: &str, password_hash: &str) -> Result<bool, sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE email = $2")
            .bind(password_hash)
            .bind(email)
            .execute(&db.pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }

    // Проверить пароль против bcrypt-хеша
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::Attendee, Role::Organizer, Role::AuditoriumAdmin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn landing_page_depends_on_role() {
        assert_eq!(Role::Organizer.landing_page(), "/dashboard");
        assert_eq!(Role::AuditoriumAdmin.landing_page(), "/admin-dashboard");
        assert_eq!(Role::Attendee.landing_page(), "/home");
    }

    #[test]
    fn verify_password_uses_bcrypt_hash() {
        let user = User {
            id: 1,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: bcrypt::hash("secret1", 4).unwrap(),
            role: Role::Attendee,
            phone: None,
            organization: None,
            created_at: Utc::now(),
        };
        assert!(user.verify_password("secret1"));
        assert!(!user.verify_password("secret2"));
    }
}
