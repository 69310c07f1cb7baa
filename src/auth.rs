use std::{convert::Infallible, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderValue},
};

use crate::error::AppError;

pub const RIDER_HEADER: &str = "x-user-id";

/// Turns whatever the client presents into a rider id.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Result<String, AppError>;
}

/// Client-generated ids, taken at face value. There is no verification: any
/// caller can act as any rider.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueTokenIdentity;

impl IdentityResolver for OpaqueTokenIdentity {
    fn resolve(&self, token: &str) -> Result<String, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::BadRequest("Missing userId".into()));
        }
        Ok(token.to_string())
    }
}

pub type SharedIdentity = Arc<dyn IdentityResolver>;

/// Raw `x-user-id` header, when present. It is only read when the request
/// body carries no rider id of its own.
#[derive(Debug, Clone, Default)]
pub struct CurrentRider(pub Option<HeaderValue>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentRider
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.headers.get(RIDER_HEADER).cloned()))
    }
}

impl CurrentRider {
    /// Prefers an explicit id from the request body, falling back to the header.
    pub fn require(
        &self,
        explicit: Option<&str>,
        identity: &dyn IdentityResolver,
    ) -> Result<String, AppError> {
        if let Some(token) = explicit.filter(|token| !token.trim().is_empty()) {
            return identity.resolve(token);
        }
        let header = self
            .0
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("Missing userId".into()))?;
        let token = header
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{RIDER_HEADER} is not valid text")))?;
        identity.resolve(token)
    }
}
