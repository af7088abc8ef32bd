//! SessionIssuer mints sessions and the access URL handed to the visitor

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::session::{Destination, SessionId, SessionStore};

/// A newly issued session and the link that opens its capture page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
    pub id: String,
    pub url: String,
}

/// Creates sessions bound to a destination
pub struct SessionIssuer {
    store: Arc<SessionStore>,
    public_base_url: String,
}

impl SessionIssuer {
    /// `public_base_url` is the externally reachable origin, e.g. `https://intake.example.org`
    pub fn new(store: Arc<SessionStore>, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            store,
            public_base_url,
        }
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Access URL for a session id
    pub fn url_for(&self, id: &SessionId) -> String {
        format!("{}/capture/{}", self.public_base_url, id)
    }

    /// Mint a session for `destination` and return its access URL
    pub async fn issue(&self, destination: &str) -> Result<IssuedSession, SessionError> {
        let destination = Destination::new(destination)?;
        let id = self.store.create(destination).await;
        tracing::info!(session_id = %id, "Issued capture session");

        Ok(IssuedSession {
            url: self.url_for(&id),
            id: id.to_string(),
        })
    }

    /// Register a session whose id was minted by another process
    pub async fn register(
        &self,
        id: &str,
        destination: &str,
    ) -> Result<IssuedSession, SessionError> {
        let id = SessionId::parse(id)?;
        let destination = Destination::new(destination)?;
        let id = self.store.insert_with_id(id, destination).await?;
        tracing::info!(session_id = %id, "Registered external capture session");

        Ok(IssuedSession {
            url: self.url_for(&id),
            id: id.to_string(),
        })
    }
}
