//! Callback payloads posted by the capture page and their validation
//!
//! Every payload is validated into a [`CaptureEvent`] before it touches the
//! session store, so a malformed request never causes a partial write.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Device fields the disclosure page lists; anything else is discarded
pub const DISCLOSED_DEVICE_FIELDS: &[&str] = &[
    "user_agent",
    "language",
    "platform",
    "screen_width",
    "screen_height",
    "timezone",
];

/// Operator-configured options offered by the capture page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Page heading shown to the visitor
    #[serde(default = "default_title")]
    pub title: String,
    /// Purpose statement shown on the disclosure step
    #[serde(default = "default_purpose")]
    pub purpose: String,
    /// Choices for the first step
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,
    /// Choices for the plan step
    #[serde(default = "default_plans")]
    pub plans: Vec<String>,
    /// Largest accepted photo after decoding
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: usize,
}

fn default_title() -> String {
    "Request form".to_string()
}

fn default_purpose() -> String {
    "The operator who sent you this link will receive the answers you submit.".to_string()
}

fn default_providers() -> Vec<String> {
    vec!["north".to_string(), "south".to_string(), "east".to_string()]
}

fn default_plans() -> Vec<String> {
    vec!["10".to_string(), "25".to_string(), "50".to_string()]
}

fn default_max_photo_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            title: default_title(),
            purpose: default_purpose(),
            providers: default_providers(),
            plans: default_plans(),
            max_photo_bytes: default_max_photo_bytes(),
        }
    }
}

/// Body of `POST /capture/{id}/consent`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentPayload {
    pub accepted: bool,
}

/// Body of `POST /capture/{id}/photo`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoPayload {
    /// `data:image/...;base64,...` URI of the file the visitor picked
    pub image: String,
    #[serde(default)]
    pub attempt: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A decoded photo upload
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub mime: String,
    pub bytes: Vec<u8>,
    pub attempt: Option<String>,
    pub timestamp: Option<String>,
}

impl PhotoPayload {
    /// Decode the data URI, rejecting non-image or oversized payloads
    pub fn decode(self, max_bytes: usize) -> Result<Photo, SessionError> {
        let rest = self
            .image
            .strip_prefix("data:")
            .ok_or_else(|| SessionError::MalformedPayload("image is not a data URI".into()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| SessionError::MalformedPayload("image data URI has no body".into()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| SessionError::MalformedPayload("image must be base64".into()))?;
        if !mime.starts_with("image/") {
            return Err(SessionError::MalformedPayload(format!(
                "unsupported media type {}",
                mime
            )));
        }

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| SessionError::MalformedPayload(format!("invalid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(SessionError::MalformedPayload("image is empty".into()));
        }
        if bytes.len() > max_bytes {
            return Err(SessionError::MalformedPayload(format!(
                "image exceeds {} bytes",
                max_bytes
            )));
        }

        Ok(Photo {
            mime: mime.to_string(),
            bytes,
            attempt: self.attempt,
            timestamp: self.timestamp,
        })
    }
}

/// Disclosed device fields shared by the visitor
pub type DeviceInfo = BTreeMap<String, serde_json::Value>;

/// Keep only disclosed fields from a device-info body
pub fn parse_device_info(body: serde_json::Value) -> Result<DeviceInfo, SessionError> {
    let serde_json::Value::Object(map) = body else {
        return Err(SessionError::MalformedPayload(
            "device info must be an object".into(),
        ));
    };

    Ok(map
        .into_iter()
        .filter(|(key, _)| DISCLOSED_DEVICE_FIELDS.contains(&key.as_str()))
        .collect())
}

/// Body of `POST /capture/{id}/location`: a fix or a failed attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationReport {
    Fix {
        #[serde(alias = "lat")]
        latitude: f64,
        #[serde(alias = "lon")]
        longitude: f64,
        accuracy: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        altitude: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heading: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
}

impl LocationReport {
    /// Reject coordinates outside the valid range
    pub fn validate(self) -> Result<Self, SessionError> {
        if let LocationReport::Fix {
            latitude,
            longitude,
            accuracy,
            ..
        } = &self
            && (!(-90.0..=90.0).contains(latitude)
                || !(-180.0..=180.0).contains(longitude)
                || *accuracy < 0.0)
        {
            return Err(SessionError::MalformedPayload(
                "coordinates out of range".into(),
            ));
        }
        Ok(self)
    }
}

/// Body of `POST /capture/{id}/submit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPayload {
    #[serde(alias = "sim")]
    pub provider: String,
    #[serde(alias = "mobile")]
    pub identifier: String,
    #[serde(alias = "amount")]
    pub plan: String,
}

/// A validated form submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub provider: String,
    pub identifier: String,
    pub plan: String,
}

impl SubmitPayload {
    pub fn validate(self, options: &CaptureOptions) -> Result<Submission, SessionError> {
        if !options.providers.iter().any(|p| p == &self.provider) {
            return Err(SessionError::MalformedPayload(format!(
                "unknown provider {}",
                self.provider
            )));
        }
        if self.identifier.len() != 10 || !self.identifier.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SessionError::MalformedPayload(
                "identifier must be 10 digits".into(),
            ));
        }
        if !options.plans.iter().any(|p| p == &self.plan) {
            return Err(SessionError::MalformedPayload(format!(
                "unknown plan {}",
                self.plan
            )));
        }

        Ok(Submission {
            provider: self.provider,
            identifier: self.identifier,
            plan: self.plan,
        })
    }
}

/// A validated callback, ready to be applied to a session and relayed
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Consent { accepted: bool },
    Photo(Photo),
    DeviceInfo(DeviceInfo),
    Location(LocationReport),
    Submit(Submission),
    Withdraw,
}

impl CaptureEvent {
    /// Short name used in logs and notification headers
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureEvent::Consent { accepted: true } => "consent",
            CaptureEvent::Consent { accepted: false } => "declined",
            CaptureEvent::Photo(_) => "photo",
            CaptureEvent::DeviceInfo(_) => "device-info",
            CaptureEvent::Location(_) => "location",
            CaptureEvent::Submit(_) => "submit",
            CaptureEvent::Withdraw => "withdraw",
        }
    }
}
