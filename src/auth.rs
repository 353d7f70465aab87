use crate::database::{Denylist, DenylistStore};
use crate::error::ApiError;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost).map_err(|err| ApiError::internal(err, "Hashing error"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    bcrypt::verify(password, hash).map_err(|err| ApiError::internal(err, "Verification error"))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Random nonce so that two sign-ins within the same second get distinct tokens.
    pub jti: String,
}

/// Signs and checks HS256 session tokens.
pub struct Tokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Tokens {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Tokens {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_owned(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: format!("{:016x}", rand::random::<u64>()),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| ApiError::internal(err, "Token error"))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| {
                debug!("Rejected token: {}", err);
                ApiError::Unauthorized
            })
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_owned())
    }
}

/// A request whose bearer token is signed, unexpired and not logged out.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub email: String,
    pub token: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let tokens = req.app_data::<web::Data<Tokens>>().cloned();
        let denylist = req.app_data::<web::Data<DenylistStore>>().cloned();

        Box::pin(async move {
            let (token, tokens, denylist) = match (token, tokens, denylist) {
                (Some(token), Some(tokens), Some(denylist)) => (token, tokens, denylist),
                (None, _, _) => return Err(ApiError::Unauthorized),
                _ => return Err(ApiError::Internal("Authentication is not configured")),
            };
            let claims = tokens.verify(&token)?;
            if !denylist.session_is_valid(&token).await? {
                debug!("Token for {} was logged out", claims.sub);
                return Err(ApiError::Unauthorized);
            }
            Ok(AuthenticatedUser {
                email: claims.sub,
                token,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("Test@1234", 4).unwrap();
        assert_ne!(hash, "Test@1234");
        assert!(verify_password("Test@1234", &hash).unwrap());
        assert!(!verify_password("Test@12345", &hash).unwrap());
    }

    #[test]
    fn issued_tokens_verify() {
        let tokens = Tokens::new("secret", 60);
        let token = tokens.issue("a@b.com").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "a@b.com");
        assert_eq!(claims.exp - claims.iat, 60);
        assert_ne!(tokens.issue("a@b.com").unwrap(), token);
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let token = Tokens::new("other", 60).issue("a@b.com").unwrap();
        assert!(matches!(
            Tokens::new("secret", 60).verify(&token),
            Err(ApiError::Unauthorized)
        ));

        let expired = Tokens::new("secret", -3600).issue("a@b.com").unwrap();
        assert!(matches!(
            Tokens::new("secret", 60).verify(&expired),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            Tokens::new("secret", 60).verify("not-a-token"),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def".to_owned()));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }
}
