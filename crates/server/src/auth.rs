//! Bearer token extractors

use crate::api::{ApiError, AppState};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use vitals_pipeline::AuthError;

/// A request carrying a valid access token
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: String,
}

/// Like [`Authenticated`], but a request without a token is let through.
/// A token that is present must still be valid.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<String>);

fn authorization_header(parts: &Parts) -> Result<Option<&str>, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::MalformedHeader))
        .transpose()
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = authorization_header(parts)?.ok_or(AuthError::MissingToken)?;
        let identity = state.tokens.verify_header(header)?;
        Ok(Self { identity })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match authorization_header(parts)? {
            Some(header) => Ok(Self(Some(state.tokens.verify_header(header)?))),
            None => Ok(Self(None)),
        }
    }
}
