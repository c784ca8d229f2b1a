use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::form_urlencoded;

/// One delivery of a queued object-creation notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub identifier: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Records is not an array")]
    RecordsNotArray,
    #[error("first record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl QueuedMessage {
    pub fn new(identifier: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            identifier: identifier.into(),
            body: body.into(),
        }
    }

    /// Reads the object reference from the first embedded record.
    ///
    /// `Ok(None)` for bodies that are not JSON or carry no records, such as the
    /// storage service's test event. Later records are never inspected, but a
    /// first record without a bucket name or object key is an error.
    pub fn object_reference(&self) -> Result<Option<ObjectReference>, RecordError> {
        let Ok(Value::Object(mut notification)) = serde_json::from_slice::<Value>(&self.body) else {
            return Ok(None);
        };
        let records = match notification.remove("Records") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(records)) => records,
            Some(_) => return Err(RecordError::RecordsNotArray),
        };
        let Some(first) = records.into_iter().next() else {
            return Ok(None);
        };

        let record: ObjectCreatedRecord = serde_json::from_value(first)?;
        Ok(Some(ObjectReference {
            container_name: record.s3.bucket.name,
            object_key: decode_object_key(&record.s3.object.key),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    pub container_name: String,
    pub object_key: String,
}

#[derive(Debug, Deserialize)]
struct ObjectCreatedRecord {
    s3: StorageEntity,
}

#[derive(Debug, Deserialize)]
struct StorageEntity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
}

/// Notification keys are form-encoded (`+` for space, `%XX` escapes).
fn decode_object_key(raw: &str) -> String {
    let mut pairs = form_urlencoded::parse(raw.as_bytes());
    match (pairs.next(), pairs.next()) {
        (Some((key, value)), None) if value.is_empty() && !raw.ends_with('=') => key.into_owned(),
        _ => raw.to_string(),
    }
}
