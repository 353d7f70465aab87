use crate::auth::{hash_password, verify_password, Tokens};
use crate::catalog::MovieCatalog;
use crate::database::{Denylist, FavoritesDb, UserDb};
use crate::error::ApiError;
use crate::model::*;
use log::info;
use rand::Rng;
use std::cmp::Reverse;

/// Suggestion scores are drawn from `0..MAX_SCORE`.
pub const MAX_SCORE: u32 = 99;

/// Pairs every item with a random score, highest score first.
pub fn rank_by_suggestion<T, R: Rng>(items: Vec<T>, rng: &mut R) -> Vec<(T, u32)> {
    let mut scored: Vec<(T, u32)> = items
        .into_iter()
        .map(|item| (item, rng.gen_range(0..MAX_SCORE)))
        .collect();
    scored.sort_by_key(|(_, score)| Reverse(*score));
    scored
}

pub async fn sign_up<U>(users: &U, payload: SignUp, bcrypt_cost: u32) -> Result<Profile, ApiError>
where
    U: UserDb + ?Sized,
{
    payload.validate()?;
    let user = User {
        password: hash_password(&payload.password, bcrypt_cost)?,
        email: payload.email,
        firstname: payload.firstname,
        lastname: payload.lastname,
    };
    Ok(users.create_user(user).await?.into())
}

pub async fn sign_in<U>(users: &U, tokens: &Tokens, payload: SignIn) -> Result<Session, ApiError>
where
    U: UserDb + ?Sized,
{
    let user = users
        .get_user(&payload.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !verify_password(&payload.password, &user.password)? {
        return Err(ApiError::InvalidCredentials);
    }
    info!("User {} signed in", user.email);
    Ok(Session {
        token: tokens.issue(&user.email)?,
        email: user.email,
        firstname: user.firstname,
        lastname: user.lastname,
    })
}

pub async fn log_out<D>(denylist: &D, token: &str) -> Result<String, ApiError>
where
    D: Denylist + ?Sized,
{
    Ok(denylist.invalidate(token).await?)
}

pub async fn browse_movies<C, R>(
    catalog: &C,
    keyword: Option<&str>,
    rng: &mut R,
) -> Result<Vec<RankedMovie>, ApiError>
where
    C: MovieCatalog + ?Sized,
    R: Rng,
{
    let keyword_ids = match keyword {
        Some(keyword) => Some(
            catalog
                .keyword_ids(keyword)
                .await?
                .ok_or(ApiError::NotFound("invalid keyword"))?,
        ),
        None => None,
    };
    let movies = catalog.discover(keyword_ids.as_deref()).await?;
    if movies.is_empty() {
        return Err(ApiError::NotFound("no movie found"));
    }
    Ok(rank_by_suggestion(movies, rng)
        .into_iter()
        .map(|(movie, suggestion_score)| RankedMovie {
            movie,
            suggestion_score,
        })
        .collect())
}

/// Saves a favorite after checking that the catalog knows a movie with exactly this id and title.
pub async fn add_favorite<F, C>(
    favorites: &F,
    catalog: &C,
    email: &str,
    payload: NewFavorite,
) -> Result<FavoriteMovie, ApiError>
where
    F: FavoritesDb + ?Sized,
    C: MovieCatalog + ?Sized,
{
    payload.validate(email)?;
    let candidates = catalog.search_by_title(&payload.title).await?;
    if !candidates
        .iter()
        .any(|movie| movie.id == payload.id && movie.title == payload.title)
    {
        return Err(ApiError::NotFound("could not find movie with that id and title"));
    }
    Ok(favorites
        .save_favorite(email, payload.id, &payload.title)
        .await?)
}

pub async fn list_favorites<F, R>(
    favorites: &F,
    email: &str,
    rng: &mut R,
) -> Result<Vec<RankedFavorite>, ApiError>
where
    F: FavoritesDb + ?Sized,
    R: Rng,
{
    let record = favorites
        .get_user_favorites(email)
        .await?
        .ok_or(ApiError::NotFound("movies not found"))?;
    Ok(rank_by_suggestion(record.favorite_movies, rng)
        .into_iter()
        .map(|(movie, suggestion_for_today_score)| RankedFavorite {
            movie,
            suggestion_for_today_score,
        })
        .collect())
}
