//! Identity provider used once per import run to find the caller.
//!
//! `JwtIdentity` reads the user from a request token; `StaticIdentity` is a
//! fixed user (CLI imports and tests).

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth;
use crate::types::Request;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The authenticated user, or `None` when there is no valid session
    async fn current_user(&self) -> Result<Option<Uuid>>;
}

/// User taken from the JWT of a NATS request
pub struct JwtIdentity {
    user_id: Option<Uuid>,
}

impl JwtIdentity {
    /// An invalid or missing token yields an identity without a user.
    pub fn from_request<T>(request: &Request<T>, jwt_secret: &str) -> Self {
        let user_id = match auth::extract_auth(request, jwt_secret) {
            Ok(info) => {
                debug!("Request {} authenticated as {} ({})", request.id, info.user_id, info.role);
                Some(info.user_id)
            }
            Err(e) => {
                warn!("Request {} not authenticated: {}", request.id, e);
                None
            }
        };
        Self { user_id }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentity {
    async fn current_user(&self) -> Result<Option<Uuid>> {
        Ok(self.user_id)
    }
}

/// Fixed user
pub struct StaticIdentity(pub Option<Uuid>);

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Result<Option<Uuid>> {
        Ok(self.0)
    }
}
