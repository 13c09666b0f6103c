//! Event decoder - turns an inbound CloudEvent into a [`Notification`]
//!
//! Accepts both CloudEvents HTTP modes:
//! - binary: attributes in `ce-*` headers, body is the storage object data
//! - structured: `application/cloudevents+json` body with the data inline
//!
//! The storage object data follows the protobuf JSON mapping, so 64-bit
//! integers may arrive either as JSON strings or numbers.

use crate::error::{ConvertError, Result};
use crate::models::Notification;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;
use tracing::info;

/// Content type of a structured-mode CloudEvent
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// CloudEvent context attributes carried in binary-mode headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventAttributes {
    pub id: Option<String>,
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub subject: Option<String>,
    pub spec_version: Option<String>,
    pub time: Option<String>,
}

impl EventAttributes {
    /// Collect attributes from `ce-*` headers using the given lookup
    pub fn from_headers<'a, F>(header: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let get = |name: &str| header(name).map(str::to_string);
        Self {
            id: get("ce-id"),
            event_type: get("ce-type"),
            source: get("ce-source"),
            subject: get("ce-subject"),
            spec_version: get("ce-specversion"),
            time: get("ce-time"),
        }
    }
}

/// Raw inbound event as delivered by the platform
#[derive(Debug, Clone)]
pub enum Envelope {
    Binary {
        attributes: EventAttributes,
        data: Bytes,
    },
    Structured(Bytes),
}

impl Envelope {
    pub fn binary(attributes: EventAttributes, data: impl Into<Bytes>) -> Self {
        Envelope::Binary {
            attributes,
            data: data.into(),
        }
    }

    pub fn structured(body: impl Into<Bytes>) -> Self {
        Envelope::Structured(body.into())
    }
}

#[derive(Debug, Deserialize)]
struct StructuredEvent {
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    data: Option<serde_json::Value>,
    data_base64: Option<String>,
}

/// Storage object payload, protobuf JSON mapping
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageObjectData {
    #[serde(default)]
    bucket: String,
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "int64")]
    metageneration: i64,
    #[serde(default, deserialize_with = "int64")]
    generation: i64,
    #[serde(default, deserialize_with = "int64")]
    size: u64,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
}

/// Decode an envelope into a notification
pub fn decode_notification(envelope: &Envelope) -> Result<Notification> {
    let (event_id, event_type, data) = match envelope {
        Envelope::Binary { attributes, data } => {
            let data: StorageObjectData = serde_json::from_slice(data)
                .map_err(|e| ConvertError::Decode(format!("invalid storage object data: {e}")))?;
            (attributes.id.clone(), attributes.event_type.clone(), data)
        }
        Envelope::Structured(body) => {
            let event: StructuredEvent = serde_json::from_slice(body)
                .map_err(|e| ConvertError::Decode(format!("invalid cloudevent: {e}")))?;
            let data = structured_data(event.data, event.data_base64)?;
            (event.id, event.event_type, data)
        }
    };

    let event_id = required(event_id, "event id")?;
    let event_type = required(event_type, "event type")?;
    let bucket = required(Some(data.bucket), "bucket")?;
    let key = required(Some(data.name), "object name")?;

    let notification = Notification {
        event_id,
        event_type,
        bucket,
        key,
        metageneration: data.metageneration,
        generation: data.generation,
        size: data.size,
        content_type: data.content_type,
        created_at: data.time_created,
        updated_at: data.updated,
    };

    info!(
        event_id = %notification.event_id,
        event_type = %notification.event_type,
        bucket = %notification.bucket,
        key = %notification.key,
        metageneration = notification.metageneration,
        created = ?notification.created_at,
        updated = ?notification.updated_at,
        "Decoded storage notification"
    );

    Ok(notification)
}

fn structured_data(
    data: Option<serde_json::Value>,
    data_base64: Option<String>,
) -> Result<StorageObjectData> {
    if let Some(value) = data {
        return serde_json::from_value(value)
            .map_err(|e| ConvertError::Decode(format!("invalid storage object data: {e}")));
    }

    let encoded = data_base64.ok_or_else(|| ConvertError::Decode("event has no data".into()))?;
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ConvertError::Decode(format!("invalid data_base64: {e}")))?;
    serde_json::from_slice(&raw)
        .map_err(|e| ConvertError::Decode(format!("invalid storage object data: {e}")))
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConvertError::Decode(format!("missing {field}")))
}

/// Protobuf JSON encodes 64-bit integers as strings; accept both forms
fn int64<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default + Deserialize<'de>,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr<T> {
        Number(T),
        Text(String),
    }

    match Option::<Repr<T>>::deserialize(deserializer)? {
        None => Ok(T::default()),
        Some(Repr::Number(n)) => Ok(n),
        Some(Repr::Text(s)) => s.parse().map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const OBJECT_DATA: &str = r#"{
        "kind": "storage#object",
        "bucket": "src-bucket",
        "name": "photo.webp",
        "metageneration": "1",
        "generation": "1700000000000001",
        "size": "5120",
        "contentType": "image/webp",
        "timeCreated": "2024-03-01T12:30:45.123Z",
        "updated": "2024-03-01T12:31:00Z"
    }"#;

    fn attributes() -> EventAttributes {
        EventAttributes {
            id: Some("evt-1".into()),
            event_type: Some("google.cloud.storage.object.v1.finalized".into()),
            source: Some("//storage.googleapis.com/projects/_/buckets/src-bucket".into()),
            subject: Some("objects/photo.webp".into()),
            spec_version: Some("1.0".into()),
            time: None,
        }
    }

    #[test]
    fn test_decode_binary_mode() {
        let envelope = Envelope::binary(attributes(), OBJECT_DATA.as_bytes().to_vec());
        let n = decode_notification(&envelope).unwrap();

        assert_eq!(n.event_id, "evt-1");
        assert_eq!(n.event_type, "google.cloud.storage.object.v1.finalized");
        assert_eq!(n.bucket, "src-bucket");
        assert_eq!(n.key, "photo.webp");
        assert_eq!(n.metageneration, 1);
        assert_eq!(n.generation, 1_700_000_000_000_001);
        assert_eq!(n.size, 5120);
        assert_eq!(n.content_type.as_deref(), Some("image/webp"));
        assert_eq!(
            n.created_at,
            Some(
                Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
                    + chrono::Duration::milliseconds(123)
            )
        );
        assert_eq!(
            n.updated_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 31, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_structured_mode_numeric_ints() {
        let body = serde_json::json!({
            "specversion": "1.0",
            "id": "evt-2",
            "type": "google.cloud.storage.object.v1.finalized",
            "source": "//storage.googleapis.com/projects/_/buckets/b",
            "data": {
                "bucket": "b",
                "name": "dir/cat.webp",
                "metageneration": 3,
                "generation": 42
            }
        });
        let envelope = Envelope::structured(serde_json::to_vec(&body).unwrap());
        let n = decode_notification(&envelope).unwrap();

        assert_eq!(n.bucket, "b");
        assert_eq!(n.key, "dir/cat.webp");
        assert_eq!(n.metageneration, 3);
        assert_eq!(n.generation, 42);
        assert_eq!(n.created_at, None);
    }

    #[test]
    fn test_decode_structured_base64_data() {
        let data = base64::engine::general_purpose::STANDARD.encode(OBJECT_DATA);
        let body = serde_json::json!({
            "specversion": "1.0",
            "id": "evt-3",
            "type": "google.cloud.storage.object.v1.finalized",
            "data_base64": data
        });
        let envelope = Envelope::structured(serde_json::to_vec(&body).unwrap());
        let n = decode_notification(&envelope).unwrap();
        assert_eq!(n.key, "photo.webp");
    }

    #[test]
    fn test_decode_preserves_object_fields() {
        let cases = [
            ("src-bucket", "photo.webp", "2024-03-01T12:30:45Z"),
            ("b", "a/b/c/deep.webp", "1999-12-31T23:59:59.999Z"),
            ("media.example.com", "/leading/slash.webp", "2030-01-01T00:00:00+02:00"),
            ("uploads-eu", "фото/猫 🐈.webp", "2024-02-29T08:00:00.5Z"),
            ("x", "noext", "1970-01-01T00:00:00Z"),
        ];

        for (bucket, key, timestamp) in cases {
            let data = serde_json::json!({
                "bucket": bucket,
                "name": key,
                "generation": "7",
                "timeCreated": timestamp,
            });
            let expected = DateTime::parse_from_rfc3339(timestamp)
                .unwrap()
                .with_timezone(&Utc);

            let binary = Envelope::binary(attributes(), serde_json::to_vec(&data).unwrap());
            let structured = Envelope::structured(
                serde_json::to_vec(&serde_json::json!({
                    "specversion": "1.0",
                    "id": "evt-1",
                    "type": "google.cloud.storage.object.v1.finalized",
                    "data": data,
                }))
                .unwrap(),
            );

            for envelope in [binary, structured] {
                let n = decode_notification(&envelope).unwrap();
                assert_eq!(n.bucket, bucket);
                assert_eq!(n.key, key);
                assert_eq!(n.generation, 7);
                assert_eq!(n.created_at, Some(expected), "{key}");
            }
        }
    }

    #[test]
    fn test_missing_bucket_is_decode_error() {
        let envelope = Envelope::binary(attributes(), r#"{"name":"photo.webp"}"#);
        let err = decode_notification(&envelope).unwrap_err();
        assert!(matches!(err, ConvertError::Decode(msg) if msg.contains("bucket")));
    }

    #[test]
    fn test_missing_event_id_is_decode_error() {
        let mut attrs = attributes();
        attrs.id = None;
        let envelope = Envelope::binary(attrs, OBJECT_DATA.as_bytes().to_vec());
        assert!(matches!(
            decode_notification(&envelope),
            Err(ConvertError::Decode(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let envelope = Envelope::structured("{not json");
        assert!(matches!(
            decode_notification(&envelope),
            Err(ConvertError::Decode(_))
        ));
    }

    #[test]
    fn test_bad_integer_is_decode_error() {
        let envelope = Envelope::binary(
            attributes(),
            r#"{"bucket":"b","name":"k","metageneration":"one"}"#,
        );
        assert!(matches!(
            decode_notification(&envelope),
            Err(ConvertError::Decode(_))
        ));
    }

    #[test]
    fn test_attributes_from_headers() {
        let headers = [("ce-id", "abc"), ("ce-type", "t"), ("ce-source", "s")];
        let attrs = EventAttributes::from_headers(|name| {
            headers.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
        });
        assert_eq!(attrs.id.as_deref(), Some("abc"));
        assert_eq!(attrs.event_type.as_deref(), Some("t"));
        assert_eq!(attrs.source.as_deref(), Some("s"));
        assert_eq!(attrs.subject, None);
    }
}
