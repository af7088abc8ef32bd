//! Session record and the partial-update rules applied by each callback

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::{CaptureEvent, DeviceInfo, LocationReport};
use crate::error::SessionError;

/// Opaque, unguessable session token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh id from 122 random bits (OS CSPRNG)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept an externally minted id if it has a safe shape
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let valid_len = (16..=64).contains(&raw.len());
        let valid_chars = raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid_len && valid_chars {
            Ok(Self(raw.to_string()))
        } else {
            Err(SessionError::InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator endpoint a session's notifications go to (e.g. a chat id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidDestination(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a used session accepts another submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPolicy {
    /// Later submissions overwrite the earlier one and are relayed again
    #[default]
    Allow,
    /// Later submissions fail with `AlreadyUsed`
    Reject,
}

/// Accumulated state for one capture session
///
/// Each callback writes only its own fields. `destination` has no setter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    destination: Destination,
    pub created_at: DateTime<Utc>,
    pub consented_at: Option<DateTime<Utc>>,
    pub withdrawn: bool,
    pub used: bool,
    pub location: Option<LocationReport>,
    pub device_info: Option<DeviceInfo>,
    pub last_provider: Option<String>,
    pub last_identifier: Option<String>,
    pub last_plan: Option<String>,
    pub photos_received: u32,
}

impl Session {
    pub fn new(id: SessionId, destination: Destination) -> Self {
        Self {
            id,
            destination,
            created_at: Utc::now(),
            consented_at: None,
            withdrawn: false,
            used: false,
            location: None,
            device_info: None,
            last_provider: None,
            last_identifier: None,
            last_plan: None,
            photos_received: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn has_consent(&self) -> bool {
        self.consented_at.is_some()
    }

    /// True once the visitor may no longer use the flow
    pub fn is_closed(&self) -> bool {
        self.used || self.withdrawn
    }

    /// Apply a validated callback as a partial update
    pub fn apply(
        &mut self,
        event: &CaptureEvent,
        policy: ReplayPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if self.withdrawn {
            return Err(SessionError::Withdrawn(self.id.to_string()));
        }

        if let CaptureEvent::Consent { accepted } = event {
            if *accepted && self.consented_at.is_none() {
                self.consented_at = Some(now);
            }
            return Ok(());
        }

        if !self.has_consent() {
            return Err(SessionError::ConsentRequired(self.id.to_string()));
        }

        match event {
            CaptureEvent::Consent { .. } => {}
            CaptureEvent::Photo(_) => {
                self.photos_received = self.photos_received.saturating_add(1);
            }
            CaptureEvent::DeviceInfo(info) => {
                let merged = self.device_info.get_or_insert_with(DeviceInfo::new);
                for (key, value) in info {
                    merged.insert(key.clone(), value.clone());
                }
            }
            CaptureEvent::Location(report) => {
                self.location = Some(report.clone());
            }
            CaptureEvent::Submit(submission) => {
                if self.used && policy == ReplayPolicy::Reject {
                    return Err(SessionError::AlreadyUsed(self.id.to_string()));
                }
                self.last_provider = Some(submission.provider.clone());
                self.last_identifier = Some(submission.identifier.clone());
                self.last_plan = Some(submission.plan.clone());
                self.used = true;
            }
            CaptureEvent::Withdraw => {
                self.location = None;
                self.device_info = None;
                self.last_provider = None;
                self.last_identifier = None;
                self.last_plan = None;
                self.photos_received = 0;
                self.withdrawn = true;
            }
        }

        Ok(())
    }
}
