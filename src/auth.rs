use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderValue, header, request::Parts},
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind as JwtErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    config::AppConfig,
    error::AuthError,
    models::User,
    repository::{Repository, RepositoryState},
};

/// The scheme literal every Authorization header must start with.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Claims
///
/// Payload of the bearer tokens. `id` is the subject: the primary key of the user the
/// token was issued to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub id: i32,
    #[serde(default)]
    pub username: String,
    /// Issued At: seconds since the epoch.
    pub iat: u64,
    /// Expiration Time: tokens past this instant are rejected.
    pub exp: u64,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Used as an extractor it is the
/// hard gate: the handler never runs without one.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// MaybeUser
///
/// The soft gate extractor: `None` for anonymous requests, still rejecting malformed
/// headers and bad tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct MaybeUser(pub Option<AuthUser>);

/// Identity
///
/// Request extension written by the soft-auth middleware once per request so that
/// downstream extractors do not verify the token a second time.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity(pub Option<AuthUser>);

/// Resolution
///
/// Non-failing outcomes of running the verifier over a request. Malformed headers and
/// bad tokens are errors in both gates; these three are interpreted differently by the
/// soft and hard gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No Authorization header was sent.
    NoCredentials,
    /// The token verified but its subject is no longer in the store.
    UnknownSubject(i32),
    Authenticated(AuthUser),
}

impl Resolution {
    pub fn soft(self) -> Option<AuthUser> {
        match self {
            Resolution::Authenticated(user) => Some(user),
            Resolution::NoCredentials | Resolution::UnknownSubject(_) => None,
        }
    }

    pub fn hard(self) -> Result<AuthUser, AuthError> {
        match self {
            Resolution::Authenticated(user) => Ok(user),
            Resolution::NoCredentials => Err(AuthError::MissingToken),
            Resolution::UnknownSubject(_) => Err(AuthError::UserNotFound),
        }
    }
}

/// TokenVerifier
///
/// Signs and verifies HS256 bearer tokens with one shared secret. The secret is handed
/// in at construction; the verifier never looks at the environment.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenVerifier {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_secs)
    }

    /// Mints a token for `user`, valid for the configured TTL.
    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Checks signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                match e.kind() {
                    JwtErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                    _ => tracing::debug!(error = %e, "rejected token"),
                }
                Err(AuthError::InvalidToken)
            }
        }
    }

    /// resolve
    ///
    /// Runs the whole verification state machine for one header value: prefix check,
    /// token verification, then the user lookup that makes the identity authoritative.
    pub async fn resolve(
        &self,
        header: Option<&HeaderValue>,
        repo: &dyn Repository,
    ) -> Result<Resolution, AuthError> {
        let Some(token) = bearer_token(header)? else {
            return Ok(Resolution::NoCredentials);
        };

        let claims = self.verify(token)?;

        match repo.get_user_by_id(claims.id).await? {
            Some(user) => Ok(Resolution::Authenticated(AuthUser::from(user))),
            None => {
                tracing::debug!(user_id = claims.id, "token subject no longer exists");
                Ok(Resolution::UnknownSubject(claims.id))
            }
        }
    }
}

/// bearer_token
///
/// Extracts the token from an Authorization header. An absent (or empty) header is
/// `Ok(None)`; anything not prefixed with `Bearer ` is an `AuthorizationHeaderError`.
pub fn bearer_token(header: Option<&HeaderValue>) -> Result<Option<&str>, AuthError> {
    let Some(value) = header else {
        return Ok(None);
    };

    let raw = value.to_str().map_err(|_| AuthError::AuthorizationHeader)?;
    if raw.is_empty() {
        return Ok(None);
    }

    raw.strip_prefix(BEARER_PREFIX)
        .map(Some)
        .ok_or(AuthError::AuthorizationHeader)
}

async fn resolve_parts<S>(parts: &Parts, state: &S) -> Result<Resolution, AuthError>
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenVerifier: FromRef<S>,
{
    let repo = RepositoryState::from_ref(state);
    let verifier = TokenVerifier::from_ref(state);

    verifier
        .resolve(parts.headers.get(header::AUTHORIZATION), repo.as_ref())
        .await
}

/// Hard gate. Reuses the identity resolved by the soft-auth middleware when present,
/// otherwise verifies the request itself.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenVerifier: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(Identity(Some(user))) = parts.extensions.get::<Identity>() {
            return Ok(user.clone());
        }

        resolve_parts(parts, state).await?.hard()
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenVerifier: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(Identity(user)) = parts.extensions.get::<Identity>() {
            return Ok(MaybeUser(user.clone()));
        }

        Ok(MaybeUser(resolve_parts(parts, state).await?.soft()))
    }
}
