//! Caller identity: maps the `Authorization` header to a user name and
//! answers namespace access questions.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("user lookup failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait UserResolver: Send + Sync {
    /// Returns the user name behind a raw `Authorization` header value.
    async fn resolve(&self, token: &str) -> Result<String, AuthError>;

    async fn can_access_namespace(&self, token: &str, namespace: &str) -> Result<bool, AuthError>;
}

/// Resolves users against the DataFoundry/OpenShift API server.
#[derive(Clone)]
pub struct OpenShiftUserResolver {
    client: Client,
    api_server: String,
}

#[derive(Deserialize)]
struct UserObject {
    metadata: ObjectMeta,
}

#[derive(Deserialize)]
struct ObjectMeta {
    name: String,
}

impl OpenShiftUserResolver {
    pub fn new(api_server: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_server: api_server.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UserResolver for OpenShiftUserResolver {
    async fn resolve(&self, token: &str) -> Result<String, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let url = format!("{}/oapi/v1/users/~", self.api_server);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(AuthError::InvalidToken),
            other => return Err(AuthError::Upstream(format!("HTTP {}", other.as_u16()))),
        }

        let user = response
            .json::<UserObject>()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;
        Ok(user.metadata.name)
    }

    async fn can_access_namespace(&self, token: &str, namespace: &str) -> Result<bool, AuthError> {
        let url = format!("{}/oapi/v1/projects/{}", self.api_server, namespace);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(false),
            other => Err(AuthError::Upstream(format!("HTTP {}", other.as_u16()))),
        }
    }
}

/// Fixed token table, parsed from `token:user,token:user`. A user may only
/// access the namespace named after it.
#[derive(Debug, Clone, Default)]
pub struct StaticUserResolver {
    tokens: HashMap<String, String>,
}

impl StaticUserResolver {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            tokens: pairs.into_iter().collect(),
        }
    }

    pub fn parse(table: &str) -> Self {
        Self::new(table.split(',').filter_map(|pair| {
            let (token, user) = pair.split_once(':')?;
            let (token, user) = (token.trim(), user.trim());
            if token.is_empty() || user.is_empty() {
                None
            } else {
                Some((token.to_string(), user.to_string()))
            }
        }))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn bare_token(header: &str) -> &str {
    let header = header.trim();
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim()
}

#[async_trait]
impl UserResolver for StaticUserResolver {
    async fn resolve(&self, token: &str) -> Result<String, AuthError> {
        let token = bare_token(token);
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
    }

    async fn can_access_namespace(&self, token: &str, namespace: &str) -> Result<bool, AuthError> {
        let user = self.resolve(token).await?;
        Ok(user == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver_parses_pairs() {
        let resolver = StaticUserResolver::parse("t1:alice, t2:admin ,broken,:nobody");
        assert_eq!(resolver.len(), 2);
        assert_eq!(resolver.resolve("Bearer t1").await.unwrap(), "alice");
        assert_eq!(resolver.resolve("t2").await.unwrap(), "admin");
        assert_eq!(resolver.resolve("t3").await, Err(AuthError::InvalidToken));
        assert_eq!(resolver.resolve("Bearer ").await, Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn test_static_resolver_namespace_access() {
        let resolver = StaticUserResolver::parse("t1:alice");
        assert!(resolver.can_access_namespace("t1", "alice").await.unwrap());
        assert!(!resolver.can_access_namespace("t1", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_openshift_resolver_reads_user_name() {
        let mut server = mockito::Server::new_async().await;
        let _user = server
            .mock("GET", "/oapi/v1/users/~")
            .match_header("authorization", "Bearer good")
            .with_status(200)
            .with_body(r#"{"kind":"User","metadata":{"name":"alice"}}"#)
            .create_async()
            .await;
        let _denied = server
            .mock("GET", "/oapi/v1/users/~")
            .match_header("authorization", "Bearer bad")
            .with_status(401)
            .create_async()
            .await;

        let resolver = OpenShiftUserResolver::new(server.url());
        assert_eq!(resolver.resolve("Bearer good").await.unwrap(), "alice");
        assert_eq!(resolver.resolve("Bearer bad").await, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_openshift_resolver_project_access() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/oapi/v1/projects/team-a")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _forbidden = server
            .mock("GET", "/oapi/v1/projects/team-b")
            .with_status(403)
            .create_async()
            .await;

        let resolver = OpenShiftUserResolver::new(server.url());
        assert!(resolver.can_access_namespace("Bearer t", "team-a").await.unwrap());
        assert!(!resolver.can_access_namespace("Bearer t", "team-b").await.unwrap());
    }
}
