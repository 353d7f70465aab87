mod auth;
mod catalog;
mod config;
mod database;
mod error;
mod logic;
mod model;
mod record_store;

use actix_web::{
    error as web_error, middleware::Logger, web, App, HttpRequest, HttpResponse, HttpServer,
};
use auth::{AuthenticatedUser, Tokens};
use catalog::{MovieCatalog, TmdbClient};
use config::Config;
use database::*;
use error::ApiError;
use log::{error, info};
use model::*;
use std::sync::Arc;

type Users = web::Data<UserStore>;
type Favorites = web::Data<FavoritesStore>;
type Banned = web::Data<DenylistStore>;
type Catalog = web::Data<dyn MovieCatalog>;

async fn sign_up(
    payload: web::Json<SignUp>,
    users: Users,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let profile = logic::sign_up(users.get_ref(), payload.into_inner(), config.bcrypt_cost).await?;
    Ok(HttpResponse::Created().json(profile))
}

async fn sign_in(
    payload: web::Json<SignIn>,
    users: Users,
    tokens: web::Data<Tokens>,
) -> Result<HttpResponse, ApiError> {
    let session = logic::sign_in(users.get_ref(), tokens.get_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(session))
}

async fn logout(user: AuthenticatedUser, denylist: Banned) -> Result<HttpResponse, ApiError> {
    let token = logic::log_out(denylist.get_ref(), &user.token).await?;
    info!("User {} logged out", user.email);
    Ok(HttpResponse::Created().json(token))
}

async fn movies(req: HttpRequest, catalog: Catalog) -> Result<HttpResponse, ApiError> {
    let keyword = req.match_info().get("keyword");
    let mut rng = rand::thread_rng();
    let movies = logic::browse_movies(catalog.get_ref(), keyword, &mut rng).await?;
    Ok(HttpResponse::Ok().json(movies))
}

async fn add_favorite(
    user: AuthenticatedUser,
    payload: web::Json<NewFavorite>,
    favorites: Favorites,
    catalog: Catalog,
) -> Result<HttpResponse, ApiError> {
    let saved = logic::add_favorite(
        favorites.get_ref(),
        catalog.get_ref(),
        &user.email,
        payload.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Created().json(saved))
}

async fn favorites(user: AuthenticatedUser, favorites: Favorites) -> Result<HttpResponse, ApiError> {
    let mut rng = rand::thread_rng();
    let ranked = logic::list_favorites(favorites.get_ref(), &user.email, &mut rng).await?;
    Ok(HttpResponse::Ok().json(ranked))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        web_error::InternalError::from_response(err, HttpResponse::BadRequest().json(message))
            .into()
    })
}

/// Everything the handlers share. One instance per process: the stores
/// serialize writers per file, so workers must not get their own copies.
#[derive(Clone)]
struct Services {
    users: Users,
    favorites: Favorites,
    denylist: Banned,
    catalog: Catalog,
    tokens: web::Data<Tokens>,
    config: web::Data<Config>,
}

impl Services {
    fn new(config: Config, catalog: Arc<dyn MovieCatalog>) -> Self {
        Services {
            users: web::Data::new(open_store(config.ephemeral, config.users_path())),
            favorites: web::Data::new(open_store(config.ephemeral, config.favorites_path())),
            denylist: web::Data::new(open_store(config.ephemeral, config.denylist_path())),
            catalog: web::Data::from(catalog),
            tokens: web::Data::new(Tokens::new(&config.jwt_secret, config.jwt_ttl_secs)),
            config: web::Data::new(config),
        }
    }

    fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(json_config())
            .app_data(self.users.clone())
            .app_data(self.favorites.clone())
            .app_data(self.denylist.clone())
            .app_data(self.catalog.clone())
            .app_data(self.tokens.clone())
            .app_data(self.config.clone())
            .route("/signUp", web::post().to(sign_up))
            .route("/signIn", web::post().to(sign_in))
            .route("/logout", web::post().to(logout))
            .route("/movies", web::get().to(movies))
            .route("/movies/{keyword}", web::get().to(movies))
            .route("/favoritemovies", web::post().to(add_favorite))
            .route("/favoritemovies", web::get().to(favorites));
    }
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("cinelist=debug,actix_web=info"),
    )
    .init();

    let config = Config::from_env().map_err(|err| {
        error!("{}", err);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;
    if config.ephemeral {
        info!("Running with in-memory stores, nothing will be persisted");
    } else {
        std::fs::create_dir_all(&config.data_dir)?;
        info!("Storing data in {}", config.data_dir.display());
    }

    let bind = config.bind.clone();
    let catalog = Arc::new(TmdbClient::new(&config.tmdb_base_url, &config.api_key));
    let services = Services::new(config, catalog);

    info!("Server running on http://{}", bind);
    HttpServer::new(move || {
        let services = services.clone();
        App::new()
            .wrap(Logger::default())
            .configure(move |cfg| services.configure(cfg))
    })
    .bind(bind)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::tests::catalog;
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};
    use std::path::PathBuf;

    fn services() -> Services {
        let config = Config {
            bind: "127.0.0.1:0".to_owned(),
            data_dir: PathBuf::from("/nonexistent"),
            jwt_secret: "test-secret".to_owned(),
            jwt_ttl_secs: 600,
            api_key: "test-key".to_owned(),
            tmdb_base_url: "http://localhost".to_owned(),
            bcrypt_cost: 4,
            ephemeral: true,
        };
        Services::new(config, Arc::new(catalog()))
    }

    fn sign_up_body() -> Value {
        json!({
            "email": "testuser@example.com",
            "password": "Test@1234",
            "firstname": "jhon",
            "lastname": "doe"
        })
    }

    macro_rules! app {
        ($services:expr) => {{
            let services = $services.clone();
            test::init_service(App::new().configure(move |cfg| services.configure(cfg))).await
        }};
    }

    macro_rules! signed_in_token {
        ($app:expr) => {{
            let req = test::TestRequest::post()
                .uri("/signUp")
                .set_json(sign_up_body())
                .to_request();
            assert_eq!(test::call_service($app, req).await.status(), StatusCode::CREATED);

            let req = test::TestRequest::post()
                .uri("/signIn")
                .set_json(json!({"email": "testuser@example.com", "password": "Test@1234"}))
                .to_request();
            let session: Session = test::call_and_read_body_json($app, req).await;
            session.token
        }};
    }

    #[actix_rt::test]
    async fn sign_up_returns_the_profile_and_rejects_duplicates() {
        let app = app!(services());
        let req = test::TestRequest::post()
            .uri("/signUp")
            .set_json(sign_up_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["email"], "testuser@example.com");
        assert!(body.get("password").is_none());

        let req = test::TestRequest::post()
            .uri("/signUp")
            .set_json(sign_up_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_rt::test]
    async fn sign_up_reports_domain_errors_as_bad_request() {
        let app = app!(services());
        let mut body = sign_up_body();
        body["email"] = json!("mail");
        let req = test::TestRequest::post().uri("/signUp").set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let message: String = test::read_body_json(resp).await;
        assert_eq!(message, "Invalid email address");
    }

    #[actix_rt::test]
    async fn wrong_password_is_forbidden() {
        let app = app!(services());
        signed_in_token!(&app);

        let req = test::TestRequest::post()
            .uri("/signIn")
            .set_json(json!({"email": "testuser@example.com", "password": "Nope@1234"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let message: String = test::read_body_json(resp).await;
        assert_eq!(message, "Either the user or the password is incorrect");
    }

    #[actix_rt::test]
    async fn favorites_require_authentication() {
        let app = app!(services());
        let req = test::TestRequest::get().uri("/favoritemovies").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/favoritemovies")
            .insert_header(("Authorization", "Bearer forged"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn favorites_flow() {
        let app = app!(services());
        let token = signed_in_token!(&app);
        let bearer = format!("Bearer {}", token);

        let req = test::TestRequest::get()
            .uri("/favoritemovies")
            .insert_header(("Authorization", bearer.as_str()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        for (id, title) in [(1, "Inception"), (2, "Interstellar")].iter() {
            let req = test::TestRequest::post()
                .uri("/favoritemovies")
                .insert_header(("Authorization", bearer.as_str()))
                .set_json(json!({"id": id, "title": title}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
            let saved: Value = test::read_body_json(resp).await;
            assert_eq!(saved["id"], *id);
            assert!(saved["addedAt"].is_string());
        }

        let req = test::TestRequest::post()
            .uri("/favoritemovies")
            .insert_header(("Authorization", bearer.as_str()))
            .set_json(json!({"id": 1, "title": "Inception"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/favoritemovies")
            .insert_header(("Authorization", bearer.as_str()))
            .set_json(json!({"id": 99, "title": "Inception"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/favoritemovies")
            .insert_header(("Authorization", bearer.as_str()))
            .to_request();
        let ranked: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(ranked.len(), 2);
        let scores: Vec<u64> = ranked
            .iter()
            .map(|movie| movie["suggestionForTodayScore"].as_u64().unwrap())
            .collect();
        assert!(scores[0] >= scores[1]);
    }

    #[actix_rt::test]
    async fn logout_invalidates_the_token() {
        let app = app!(services());
        let token = signed_in_token!(&app);
        let bearer = format!("Bearer {}", token);

        let req = test::TestRequest::post()
            .uri("/logout")
            .insert_header(("Authorization", bearer.as_str()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        for req in vec![
            test::TestRequest::post().uri("/logout"),
            test::TestRequest::get().uri("/favoritemovies"),
        ] {
            let req = req
                .insert_header(("Authorization", bearer.as_str()))
                .to_request();
            assert_eq!(
                test::call_service(&app, req).await.status(),
                StatusCode::UNAUTHORIZED
            );
        }
    }

    #[actix_rt::test]
    async fn movies_are_ranked_by_suggestion_score() {
        let app = app!(services());
        let req = test::TestRequest::get().uri("/movies").to_request();
        let movies: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(movies.len(), 3);
        let scores: Vec<u64> = movies
            .iter()
            .map(|movie| movie["suggestionScore"].as_u64().unwrap())
            .collect();
        assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));

        let req = test::TestRequest::get().uri("/movies/nothing").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let message: String = test::read_body_json(resp).await;
        assert_eq!(message, "invalid keyword");
    }
}
