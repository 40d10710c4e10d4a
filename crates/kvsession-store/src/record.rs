//! Stored record layout and the session codec.
//!
//! A record is a flat attribute map keyed by `session_id`:
//!
//! | attribute    | type | contents                                  |
//! |--------------|------|-------------------------------------------|
//! | `session_id` | S    | primary key                               |
//! | `value`      | S    | JSON encoding of the session payload      |
//! | `creation`   | S    | RFC 3339 timestamp, written once          |
//! | `expiration` | N    | seconds since the Unix epoch              |
//!
//! Records written by the older writer carry only `session_id` and a `value`
//! of the form `{"Data": {...}, "Expiration": "<RFC 3339>"}`. They are still
//! readable; see [`decode`].

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::session::{Session, SessionData, SessionId};

/// Primary key attribute.
pub const KEY_ATTRIBUTE: &str = "session_id";
/// Serialized payload attribute.
pub const VALUE_ATTRIBUTE: &str = "value";
/// Creation timestamp attribute.
pub const CREATION_ATTRIBUTE: &str = "creation";
/// Expiration attribute.
pub const EXPIRATION_ATTRIBUTE: &str = "expiration";

/// A single typed attribute value.
///
/// Numbers travel as decimal text, matching the backing store's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String attribute.
    S(String),
    /// Number attribute.
    N(String),
}

impl AttributeValue {
    /// Build a number attribute from an integer.
    pub fn number(n: i64) -> Self {
        Self::N(n.to_string())
    }

    /// The string contents, if this is a string attribute.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            Self::N(_) => None,
        }
    }

    /// The decimal text, if this is a number attribute.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            Self::S(_) => None,
        }
    }
}

/// A stored record.
pub type Item = BTreeMap<String, AttributeValue>;

/// Payload envelope used by the older writer.
#[derive(Debug, Deserialize)]
struct LegacyEnvelope {
    #[serde(rename = "Data", default)]
    data: Option<SessionData>,
    #[serde(rename = "Expiration")]
    expiration: DateTime<Utc>,
}

/// Encode a session as a record.
pub fn encode(session: &Session) -> Result<Item> {
    let value = serde_json::to_string(session.data())
        .map_err(|e| SessionError::corrupt(session.id().as_str(), e.to_string()))?;

    let mut item = Item::new();
    item.insert(
        KEY_ATTRIBUTE.to_string(),
        AttributeValue::S(session.id().to_string()),
    );
    item.insert(VALUE_ATTRIBUTE.to_string(), AttributeValue::S(value));
    item.insert(
        CREATION_ATTRIBUTE.to_string(),
        AttributeValue::S(
            session
                .creation()
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
    );
    item.insert(
        EXPIRATION_ATTRIBUTE.to_string(),
        AttributeValue::number(session.expiration().timestamp()),
    );
    Ok(item)
}

/// Decode a record fetched for `session_id`.
///
/// Records without an `expiration` attribute are accepted only in the legacy
/// envelope shape. Their creation time is not stored, so it is reconstructed
/// as `expiration - legacy_ttl`, the moment of the last legacy write.
pub fn decode(session_id: &SessionId, item: &Item, legacy_ttl: Duration) -> Result<Session> {
    let corrupt = |reason: String| SessionError::corrupt(session_id.as_str(), reason);

    if let Some(key) = item.get(KEY_ATTRIBUTE) {
        match key.as_s() {
            Some(stored) if stored == session_id.as_str() => {}
            Some(stored) => return Err(corrupt(format!("record is keyed '{stored}'"))),
            None => return Err(corrupt(format!("'{KEY_ATTRIBUTE}' is not a string"))),
        }
    }

    let value = item
        .get(VALUE_ATTRIBUTE)
        .ok_or_else(|| corrupt(format!("missing '{VALUE_ATTRIBUTE}'")))?
        .as_s()
        .ok_or_else(|| corrupt(format!("'{VALUE_ATTRIBUTE}' is not a string")))?;

    let Some(expiration) = item.get(EXPIRATION_ATTRIBUTE) else {
        return decode_legacy(session_id, value, legacy_ttl);
    };

    let data: SessionData =
        serde_json::from_str(value).map_err(|e| corrupt(format!("payload: {e}")))?;

    let creation = item
        .get(CREATION_ATTRIBUTE)
        .ok_or_else(|| corrupt(format!("missing '{CREATION_ATTRIBUTE}'")))?
        .as_s()
        .ok_or_else(|| corrupt(format!("'{CREATION_ATTRIBUTE}' is not a string")))?;
    let creation = DateTime::parse_from_rfc3339(creation)
        .map_err(|e| corrupt(format!("creation: {e}")))?
        .with_timezone(&Utc);

    let expiration = expiration
        .as_n()
        .ok_or_else(|| corrupt(format!("'{EXPIRATION_ATTRIBUTE}' is not a number")))?;
    let expiration = expiration
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| corrupt(format!("expiration '{expiration}' is not epoch seconds")))?;

    Ok(Session::from_parts(
        session_id.clone(),
        data,
        creation,
        expiration,
    ))
}

fn decode_legacy(session_id: &SessionId, value: &str, legacy_ttl: Duration) -> Result<Session> {
    let envelope: LegacyEnvelope = serde_json::from_str(value).map_err(|e| {
        SessionError::corrupt(
            session_id.as_str(),
            format!("missing '{EXPIRATION_ATTRIBUTE}' and not a legacy envelope: {e}"),
        )
    })?;

    let expiration = DateTime::from_timestamp(envelope.expiration.timestamp(), 0)
        .unwrap_or(envelope.expiration);
    let ttl = TimeDelta::from_std(legacy_ttl).unwrap_or(TimeDelta::zero());
    let creation = expiration.checked_sub_signed(ttl).unwrap_or(expiration);

    Ok(Session::from_parts(
        session_id.clone(),
        envelope.data.unwrap_or_default(),
        creation,
        expiration,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(600);

    fn session() -> Session {
        let mut data = SessionData::new();
        data.insert("user".to_string(), json!(1));
        data.insert("roles".to_string(), json!(["admin", "ops"]));
        let now = DateTime::parse_from_rfc3339("2024-03-01T12:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        Session::new("abc", data, now, TTL)
    }

    #[test]
    fn test_encode_layout() {
        let item = encode(&session()).unwrap();

        assert_eq!(item.len(), 4);
        assert_eq!(item[KEY_ATTRIBUTE], AttributeValue::S("abc".to_string()));
        assert_eq!(
            item[CREATION_ATTRIBUTE],
            AttributeValue::S("2024-03-01T12:00:00.123456789Z".to_string())
        );
        let expected = DateTime::parse_from_rfc3339("2024-03-01T12:10:00Z")
            .unwrap()
            .timestamp();
        assert_eq!(item[EXPIRATION_ATTRIBUTE], AttributeValue::number(expected));

        let payload: serde_json::Value =
            serde_json::from_str(item[VALUE_ATTRIBUTE].as_s().unwrap()).unwrap();
        assert_eq!(payload, json!({"user": 1, "roles": ["admin", "ops"]}));
    }

    #[test]
    fn test_decode_preserves_every_field() {
        let original = session();
        let item = encode(&original).unwrap();
        let decoded = decode(original.id(), &item, TTL).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_legacy_envelope() {
        let id = SessionId::new("legacy");
        let mut item = Item::new();
        item.insert(KEY_ATTRIBUTE.to_string(), AttributeValue::S("legacy".to_string()));
        item.insert(
            VALUE_ATTRIBUTE.to_string(),
            AttributeValue::S(
                r#"{"Data":{"user":7},"Expiration":"2024-03-01T12:10:00.500Z"}"#.to_string(),
            ),
        );

        let decoded = decode(&id, &item, TTL).unwrap();
        let expiration = DateTime::parse_from_rfc3339("2024-03-01T12:10:00Z").unwrap();
        let creation = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z").unwrap();

        assert_eq!(decoded.data().get("user"), Some(&json!(7)));
        assert_eq!(decoded.expiration(), expiration);
        assert_eq!(decoded.creation(), creation);
    }

    #[test]
    fn test_decode_legacy_without_data() {
        let id = SessionId::new("legacy");
        let mut item = Item::new();
        item.insert(
            VALUE_ATTRIBUTE.to_string(),
            AttributeValue::S(r#"{"Expiration":"2024-03-01T12:10:00Z"}"#.to_string()),
        );

        let decoded = decode(&id, &item, TTL).unwrap();
        assert!(decoded.data().is_empty());
    }

    #[test]
    fn test_id_only_record_is_corrupt() {
        let id = SessionId::new("abc");
        let mut item = Item::new();
        item.insert(KEY_ATTRIBUTE.to_string(), AttributeValue::S("abc".to_string()));

        assert!(matches!(
            decode(&id, &item, TTL),
            Err(SessionError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_value_without_expiration_is_corrupt() {
        let id = SessionId::new("abc");
        let mut item = encode(&session()).unwrap();
        item.remove(EXPIRATION_ATTRIBUTE);

        let err = decode(&id, &item, TTL).unwrap_err();
        assert!(matches!(err, SessionError::CorruptRecord { .. }));
    }

    #[test]
    fn test_malformed_payload_is_corrupt() {
        let original = session();
        let mut item = encode(&original).unwrap();
        item.insert(
            VALUE_ATTRIBUTE.to_string(),
            AttributeValue::S("{not json".to_string()),
        );

        assert!(matches!(
            decode(original.id(), &item, TTL),
            Err(SessionError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_non_object_payload_is_corrupt() {
        let original = session();
        let mut item = encode(&original).unwrap();
        item.insert(VALUE_ATTRIBUTE.to_string(), AttributeValue::S("[1,2]".to_string()));

        assert!(decode(original.id(), &item, TTL).is_err());
    }

    #[test]
    fn test_bad_timestamps_are_corrupt() {
        let original = session();

        let mut item = encode(&original).unwrap();
        item.insert(
            EXPIRATION_ATTRIBUTE.to_string(),
            AttributeValue::S("1700000000".to_string()),
        );
        assert!(decode(original.id(), &item, TTL).is_err());

        let mut item = encode(&original).unwrap();
        item.insert(
            EXPIRATION_ATTRIBUTE.to_string(),
            AttributeValue::N("soon".to_string()),
        );
        assert!(decode(original.id(), &item, TTL).is_err());

        let mut item = encode(&original).unwrap();
        item.insert(
            CREATION_ATTRIBUTE.to_string(),
            AttributeValue::S("yesterday".to_string()),
        );
        assert!(decode(original.id(), &item, TTL).is_err());
    }

    #[test]
    fn test_key_mismatch_is_corrupt() {
        let item = encode(&session()).unwrap();
        let err = decode(&SessionId::new("other"), &item, TTL).unwrap_err();
        assert!(matches!(err, SessionError::CorruptRecord { session_id, .. } if session_id == "other"));
    }
}
