use crate::error::{StoreError, StoreResult};
use crate::model::*;
use crate::record_store::{MemoryBackend, RecordStore};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub type UserStore = RecordStore<User>;
/// Favorites lines stay untyped so that a rewrite puts every other user's
/// record back exactly as it was read.
pub type FavoritesStore = RecordStore<Value>;
pub type DenylistStore = RecordStore<String>;

pub fn open_store<T>(ephemeral: bool, path: PathBuf) -> RecordStore<T>
where
    T: Serialize + DeserializeOwned,
{
    if ephemeral {
        RecordStore::new(MemoryBackend::new())
    } else {
        RecordStore::open(path)
    }
}

#[async_trait]
pub trait UserDb: Send + Sync {
    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken.
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn get_user(&self, email: &str) -> StoreResult<Option<User>>;
}

#[async_trait]
impl UserDb for UserStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let _guard = self.exclusive().await;
        let users = self.read_all().await?;
        if users.iter().any(|existing| existing.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        self.append(&user).await?;
        info!("Registered user {}", user.email);
        Ok(user)
    }

    async fn get_user(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|user| user.email == email))
    }
}

#[async_trait]
pub trait FavoritesDb: Send + Sync {
    /// `None` means the user never saved a favorite, which is distinct from an empty list.
    async fn get_user_favorites(&self, email: &str) -> StoreResult<Option<FavoritesRecord>>;
    async fn save_favorite(
        &self,
        email: &str,
        movie_id: u64,
        title: &str,
    ) -> StoreResult<FavoriteMovie>;
}

fn owner(record: &Value) -> Option<&str> {
    record.get("userEmail")?.as_str()
}

fn push_favorite(record: &mut Value, favorite: &FavoriteMovie) -> StoreResult<()> {
    let movies = &mut record["favoriteMovies"];
    if !movies.is_array() {
        *movies = Value::Array(Vec::new());
    }
    if let Value::Array(movies) = movies {
        if movies.iter().any(|movie| movie["id"].as_u64() == Some(favorite.id)) {
            return Err(StoreError::DuplicateFavorite(favorite.id));
        }
        movies.push(serde_json::to_value(favorite)?);
    }
    Ok(())
}

#[async_trait]
impl FavoritesDb for FavoritesStore {
    async fn get_user_favorites(&self, email: &str) -> StoreResult<Option<FavoritesRecord>> {
        let record = self
            .read_all()
            .await?
            .into_iter()
            .find(|record| owner(record) == Some(email));
        Ok(record.and_then(|record| match serde_json::from_value(record) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("Unreadable favorites of {} in {}: {}", email, self.name(), err);
                None
            }
        }))
    }

    async fn save_favorite(
        &self,
        email: &str,
        movie_id: u64,
        title: &str,
    ) -> StoreResult<FavoriteMovie> {
        let _guard = self.exclusive().await;
        let mut records = self.read_all().await?;
        let favorite = FavoriteMovie::added_now(movie_id, title);

        match records.iter().position(|record| owner(record) == Some(email)) {
            Some(index) => {
                push_favorite(&mut records[index], &favorite)?;
                self.rewrite_all(&records).await?;
            }
            None => {
                let record = FavoritesRecord {
                    user_email: email.to_owned(),
                    favorite_movies: vec![favorite.clone()],
                };
                self.append(&serde_json::to_value(&record)?).await?;
            }
        }
        debug!("Saved favorite {} for {}", movie_id, email);
        Ok(favorite)
    }
}

#[async_trait]
pub trait Denylist: Send + Sync {
    async fn is_banned(&self, token: &str) -> StoreResult<bool>;
    /// Fails with [`StoreError::AlreadyBanned`] on a repeat.
    async fn invalidate(&self, token: &str) -> StoreResult<String>;

    async fn session_is_valid(&self, token: &str) -> StoreResult<bool> {
        Ok(!self.is_banned(token).await?)
    }
}

#[async_trait]
impl Denylist for DenylistStore {
    async fn is_banned(&self, token: &str) -> StoreResult<bool> {
        Ok(self.read_all().await?.iter().any(|banned| banned == token))
    }

    async fn invalidate(&self, token: &str) -> StoreResult<String> {
        let _guard = self.exclusive().await;
        if self.is_banned(token).await? {
            return Err(StoreError::AlreadyBanned);
        }
        let token = token.to_owned();
        self.append(&token).await?;
        Ok(token)
    }
}
