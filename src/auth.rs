use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

use crate::models::User;

/// Token lifetime for tokens minted by the identity bridge.
const TOKEN_TTL_HOURS: i64 = 24;

/// Identity asserted by the external provider and carried in the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub exp: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("JWT_SECRET not set")]
    MissingSecret,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

fn jwt_secret() -> Result<String, AuthError> {
    env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)
}

/// Validate a JWT and return its claims.
pub fn decode_jwt(token: &str) -> Result<Claims, AuthError> {
    let secret = jwt_secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Mint a token for `user`, valid for a day.
pub fn create_jwt(user: &User) -> Result<String, AuthError> {
    let secret = jwt_secret()?;
    let exp = (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize;
    let claims = Claims {
        sub: user.id.clone(),
        name: user.name.clone(),
        avatar_url: user.avatar_url.clone(),
        exp,
    };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

/// Extractor yielding validated `Claims`. Use `Option<Auth>` where anonymous callers are allowed.
pub struct Auth(pub Claims);

impl Auth {
    pub fn user_id(&self) -> &str {
        &self.0.sub
    }

    /// Snapshot to embed in new stories and comments.
    pub fn author(&self) -> User {
        User {
            id: self.0.sub.clone(),
            name: self.0.name.clone(),
            avatar_url: self.0.avatar_url.clone(),
        }
    }
}

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            return ready(match decode_jwt(bearer.token()) {
                Ok(claims) => Ok(Auth(claims)),
                Err(AuthError::MissingSecret) => {
                    Err(actix_web::error::ErrorInternalServerError("auth not configured"))
                }
                Err(_) => Err(actix_web::error::ErrorUnauthorized("Invalid JWT")),
            });
        }
        ready(Err(actix_web::error::ErrorUnauthorized("Authorization required")))
    }
}
