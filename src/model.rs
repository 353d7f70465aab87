use crate::catalog::CatalogMovie;
use crate::error::DomainError;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored account. `password` is always a bcrypt hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesRecord {
    pub user_email: String,
    #[serde(default)]
    pub favorite_movies: Vec<FavoriteMovie>,
}

/// A saved movie. `added_at` is kept exactly as it was stored, older
/// entries may carry it in another representation than the one written now.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteMovie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub added_at: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FavoriteMovie {
    /// Stamps the entry with the current time in UTC, to the millisecond.
    pub fn added_now<S: Into<String>>(id: u64, title: S) -> Self {
        FavoriteMovie {
            id,
            title: title.into(),
            added_at: Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            extra: Map::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
}

impl SignUp {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !is_valid_email(&self.email) {
            return Err(DomainError::InvalidEmail);
        }
        if !is_valid_password(&self.password) {
            return Err(DomainError::InvalidPassword);
        }
        if self.firstname.is_empty() {
            return Err(DomainError::MissingFirstName);
        }
        if self.lastname.is_empty() {
            return Err(DomainError::MissingLastName);
        }
        Ok(())
    }
}

fn is_valid_email(email: &str) -> bool {
    email.chars().count() > 8 && email.contains('@')
}

fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_uppercase())
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct NewFavorite {
    pub id: u64,
    pub title: String,
}

impl NewFavorite {
    pub fn validate(&self, user_email: &str) -> Result<(), DomainError> {
        if self.id == 0 {
            return Err(DomainError::MissingMovieId);
        }
        if self.title.is_empty() {
            return Err(DomainError::MissingTitle);
        }
        if user_email.is_empty() {
            return Err(DomainError::MissingUserEmail);
        }
        Ok(())
    }
}

/// What the API returns for an account; never includes the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Profile {
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedFavorite {
    #[serde(flatten)]
    pub movie: FavoriteMovie,
    pub suggestion_for_today_score: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedMovie {
    #[serde(flatten)]
    pub movie: CatalogMovie,
    pub suggestion_score: u32,
}
