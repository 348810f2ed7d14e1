//! Payload shapes exchanged with the hosting platform.

use crate::error::StageError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage notification delivered to the frame-extraction stage.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

/// Bucket and key of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl StorageEvent {
    pub fn from_value(event: &Value) -> Result<Self, StageError> {
        Self::deserialize(event).map_err(|e| StageError::InvalidEvent(e.to_string()))
    }

    /// The object named by the first record. One object per invocation.
    pub fn first_object(&self) -> Result<ObjectLocation, StageError> {
        let record = self
            .records
            .first()
            .ok_or_else(|| StageError::InvalidEvent("event has no records".into()))?;
        if self.records.len() > 1 {
            tracing::warn!(records = self.records.len(), "processing only the first event record");
        }
        Ok(ObjectLocation {
            bucket: record.s3.bucket.name.clone(),
            key: record.s3.object.key.clone(),
        })
    }
}

/// Hand-off from the frame-extraction stage to the recognition stage.
///
/// Callers other than the first stage may omit `bucket_name` or add fields
/// of their own; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    pub img_file_name: String,
}

impl HandoffPayload {
    pub fn from_value(event: &Value) -> Result<Self, StageError> {
        Self::deserialize(event).map_err(|e| StageError::InvalidEvent(e.to_string()))
    }
}

/// Result record returned to the invoking platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl Response {
    pub const OK: u16 = 200;
    pub const CLIENT_ERROR: u16 = 400;
    pub const SERVER_ERROR: u16 = 500;

    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: Self::OK,
            body: body.into(),
        }
    }

    pub fn client_error(body: impl Into<String>) -> Self {
        Self {
            status_code: Self::CLIENT_ERROR,
            body: body.into(),
        }
    }

    pub fn server_error(body: impl Into<String>) -> Self {
        Self {
            status_code: Self::SERVER_ERROR,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_storage_event_first_object() {
        let event = json!({
            "Records": [{
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "videos-in", "arn": "arn:aws:s3:::videos-in" },
                    "object": { "key": "test_00.mp4", "size": 1024 }
                }
            }]
        });
        let location = StorageEvent::from_value(&event).unwrap().first_object().unwrap();
        assert_eq!(location.bucket, "videos-in");
        assert_eq!(location.key, "test_00.mp4");
    }

    #[test]
    fn test_storage_event_without_records() {
        let event = json!({ "Records": [] });
        let err = StorageEvent::from_value(&event).unwrap().first_object().unwrap_err();
        assert!(matches!(err, StageError::InvalidEvent(_)));
    }

    #[test]
    fn test_storage_event_missing_key() {
        let event = json!({ "Records": [{ "s3": { "bucket": { "name": "b" }, "object": {} } }] });
        assert!(matches!(StorageEvent::from_value(&event), Err(StageError::InvalidEvent(_))));
    }

    #[test]
    fn test_handoff_payload_wire_shape() {
        let payload = HandoffPayload {
            bucket_name: Some("stage-1".into()),
            img_file_name: "test_00.jpg".into(),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "bucket_name": "stage-1", "img_file_name": "test_00.jpg" })
        );
    }

    #[test]
    fn test_handoff_payload_bucket_optional_and_extra_fields_ignored() {
        let event = json!({ "img_file_name": "a.jpg", "requested_by": "manual" });
        let payload = HandoffPayload::from_value(&event).unwrap();
        assert_eq!(payload.bucket_name, None);
        assert_eq!(payload.img_file_name, "a.jpg");
    }

    #[test]
    fn test_handoff_payload_requires_image_name() {
        let event = json!({ "bucket_name": "stage-1" });
        assert!(matches!(HandoffPayload::from_value(&event), Err(StageError::InvalidEvent(_))));
    }

    #[test]
    fn test_response_serializes_status_code_field() {
        let value = serde_json::to_value(Response::ok("Recognized face: bob")).unwrap();
        assert_eq!(value, json!({ "statusCode": 200, "body": "Recognized face: bob" }));
    }
}
