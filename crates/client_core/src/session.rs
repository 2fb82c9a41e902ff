//! Identity plumbing: who is signed in, and the bearer token to send.
//!
//! Sign-in itself belongs to the external OIDC provider. The client only needs
//! the resulting access token, handed over through [`PrincipalProvider`].

use std::collections::HashSet;

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use shared::protocol::Profile;
use tracing::{debug, warn};

use crate::{api::ManagerApi, error::ClientError};

#[async_trait]
pub trait PrincipalProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;
    fn user_id(&self) -> Option<String>;
    async fn access_token(&self) -> Result<String, ClientError>;
}

#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    sub: Option<String>,
}

/// Principal backed by an access token obtained out of band.
#[derive(Debug, Clone, Default)]
pub struct TokenPrincipal {
    token: Option<String>,
    subject: Option<String>,
}

impl TokenPrincipal {
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|token| !token.trim().is_empty());
        let subject = token.as_deref().and_then(token_subject);
        Self { token, subject }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Reads the `sub` claim without checking the signature; the manager does that.
fn token_subject(token: &str) -> Option<String> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    match decode::<AccessTokenClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.sub,
        Err(err) => {
            warn!(error = %err, "access token is not a decodable JWT; user id unknown");
            None
        }
    }
}

#[async_trait]
impl PrincipalProvider for TokenPrincipal {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn user_id(&self) -> Option<String> {
        self.subject.clone()
    }

    async fn access_token(&self) -> Result<String, ClientError> {
        self.token.clone().ok_or(ClientError::MissingAccessToken)
    }
}

/// Current user's profile, or `None` without touching the network when nobody is signed in.
pub async fn load_profile(
    principal: &dyn PrincipalProvider,
    api: &dyn ManagerApi,
) -> Result<Option<Profile>, ClientError> {
    if !principal.is_authenticated() {
        debug!("not authenticated; skipping profile load");
        return Ok(None);
    }
    api.current_profile().await.map(Some)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
