use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// The authenticated caller. Extracting it rejects the request with 1305
/// when the token is missing or unknown.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub user: String,
    /// Raw `Authorization` value, kept for namespace access checks.
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;

        let user = state
            .users
            .resolve(token)
            .await
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        Ok(Self {
            user,
            token: token.to_string(),
        })
    }
}

impl CallerIdentity {
    /// Picks the namespace a read applies to. Admins may name any namespace
    /// (`None` means all); others default to their own and need access for
    /// anything else.
    pub async fn scope_namespace(
        &self,
        state: &AppState,
        requested: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let requested = requested.map(str::trim).filter(|ns| !ns.is_empty());

        if state.orchestrator.is_admin(&self.user) {
            return Ok(requested.map(str::to_string));
        }

        match requested {
            None => Ok(Some(self.user.clone())),
            Some(ns) if ns == self.user => Ok(Some(ns.to_string())),
            Some(ns) => {
                self.require_access(state, ns).await?;
                Ok(Some(ns.to_string()))
            }
        }
    }

    /// Fails with 1306 unless the caller is an admin, owns `namespace`, or
    /// the resolver grants access.
    pub async fn require_access(&self, state: &AppState, namespace: &str) -> Result<(), AppError> {
        if state.orchestrator.is_admin(&self.user) || namespace == self.user {
            return Ok(());
        }

        let allowed = state
            .users
            .can_access_namespace(&self.token, namespace)
            .await
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
        if allowed {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!(
                "{} cannot access namespace {}",
                self.user, namespace
            )))
        }
    }
}
