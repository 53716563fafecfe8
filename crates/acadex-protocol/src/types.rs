//! Core data model and feed wire types.
//!
//! Everything in this module travels "on the wire" or sits in the
//! authoritative store, so every type derives `Serialize`/`Deserialize`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The tenant boundary. Every invariant is scoped per institute.
///
/// Newtype over the identity provider's string id, so an `InstituteId` can
/// never be passed where a `StudentId` is expected. `#[serde(transparent)]`
/// keeps it a bare string in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstituteId(pub String);

/// A teacher's user id as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeacherId(pub String);

/// A student's user id as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

macro_rules! string_id {
    ($($ty:ident),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl $ty {
            /// Borrow the raw id.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    )*};
}

string_id!(InstituteId, TeacherId, StudentId);

/// Identifier of a broadcast session. Generated by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role an authenticated user holds inside their institute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Hod,
    InstituteAdmin,
    SuperAdmin,
}

// ---------------------------------------------------------------------------
// Geolocation
// ---------------------------------------------------------------------------

/// A WGS-84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a point from latitude and longitude in degrees.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `true` when both coordinates are finite and inside their ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// A teacher-initiated window during which attendance may be marked.
///
/// At most one session per institute has `is_active == true` at any instant.
/// The store enforces that; nothing else may flip `is_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub institute_id: InstituteId,
    pub teacher_id: TeacherId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    pub subject: String,
    pub department: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Where the teacher stood when the session started.
    pub geofence: GeoPoint,
}

/// Proof that a student scanned a live token. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub institute_id: InstituteId,
    /// Copied from the session so history views need no join.
    pub subject: String,
    pub marked_at: DateTime<Utc>,
    pub geolocation: GeoPoint,
}

// ---------------------------------------------------------------------------
// Push feed
// ---------------------------------------------------------------------------

/// A push-subscription topic.
///
/// `#[serde(tag = "kind")]` renders `{ "kind": "ActiveSession", "institute_id": "..." }`,
/// which is easy to build from a browser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Topic {
    /// The active session slot of one institute.
    ActiveSession { institute_id: InstituteId },
    /// The attendance roster of one session.
    Attendance { session_id: SessionId },
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveSession { institute_id } => {
                write!(f, "active-session/{institute_id}")
            }
            Self::Attendance { session_id } => {
                write!(f, "attendance/{session_id}")
            }
        }
    }
}

/// A document carried by a feed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum FeedItem {
    Session(Session),
    Attendance(AttendanceRecord),
}

impl FeedItem {
    /// Stable document id, unique within a topic.
    pub fn doc_id(&self) -> String {
        match self {
            Self::Session(s) => s.id.to_string(),
            Self::Attendance(r) => r.id.to_string(),
        }
    }
}

/// One ordered change to a topic's document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "item", rename_all = "snake_case")]
pub enum Change {
    Added(FeedItem),
    Modified(FeedItem),
    Removed(FeedItem),
}

impl Change {
    /// The document this change is about.
    pub fn item(&self) -> &FeedItem {
        match self {
            Self::Added(item) | Self::Modified(item) | Self::Removed(item) => item,
        }
    }
}

/// A change delivered to a subscriber, stamped with the store revision that
/// produced it. Revisions strictly increase per subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub topic: Topic,
    pub revision: u64,
    pub change: Change,
}

/// Messages exchanged on a feed connection.
///
/// Client → server: `Handshake`, `Subscribe`, `Unsubscribe`, `Heartbeat`,
/// `Disconnect`. Server → client: `HandshakeAck`, `Subscribed`,
/// `Unsubscribed`, `Event`, `HeartbeatAck`, `Error`, `Disconnect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedMessage {
    Handshake {
        version: u32,
        token: Option<String>,
    },
    HandshakeAck {
        user_id: String,
        server_time: u64,
    },
    Subscribe {
        topic: Topic,
    },
    Subscribed {
        topic: Topic,
        revision: u64,
    },
    Unsubscribe {
        topic: Topic,
    },
    Unsubscribed {
        topic: Topic,
    },
    Event(FeedEvent),
    Heartbeat {
        client_time: u64,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },
    /// `code` follows HTTP conventions (400, 401, 404, 429...).
    Error {
        code: u16,
        message: String,
    },
    Disconnect {
        reason: String,
    },
}

/// The outer frame of every feed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-connection sequence number assigned by the sender.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub payload: FeedMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            id: SessionId::new(),
            institute_id: InstituteId::from("inst-1"),
            teacher_id: TeacherId::from("t-1"),
            teacher_name: None,
            subject: "DBMS".into(),
            department: "CS".into(),
            started_at: Utc::now(),
            ended_at: None,
            is_active: true,
            geofence: GeoPoint::new(18.52, 73.85),
        }
    }

    #[test]
    fn test_string_ids_serialize_transparently() {
        let json = serde_json::to_string(&StudentId::from("s-42")).unwrap();
        assert_eq!(json, "\"s-42\"");
    }

    #[test]
    fn test_session_id_parses_its_display_form() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_geo_point_is_valid_rejects_out_of_range() {
        assert!(GeoPoint::new(18.5, 73.8).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_topic_json_shape() {
        let topic = Topic::ActiveSession {
            institute_id: InstituteId::from("inst-1"),
        };
        let value = serde_json::to_value(&topic).unwrap();
        assert_eq!(value["kind"], "ActiveSession");
        assert_eq!(value["institute_id"], "inst-1");
    }

    #[test]
    fn test_topic_display() {
        let topic = Topic::ActiveSession {
            institute_id: InstituteId::from("inst-1"),
        };
        assert_eq!(topic.to_string(), "active-session/inst-1");
    }

    #[test]
    fn test_change_json_shape_is_op_and_item() {
        let change = Change::Removed(FeedItem::Session(session()));
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["op"], "removed");
        assert_eq!(value["item"]["kind"], "Session");
        assert_eq!(value["item"]["data"]["subject"], "DBMS");
    }

    #[test]
    fn test_feed_item_doc_id_matches_record_id() {
        let s = session();
        assert_eq!(FeedItem::Session(s.clone()).doc_id(), s.id.to_string());
    }

    #[test]
    fn test_event_message_round_trips() {
        let msg = FeedMessage::Event(FeedEvent {
            topic: Topic::Attendance {
                session_id: SessionId::new(),
            },
            revision: 7,
            change: Change::Added(FeedItem::Session(session())),
        });
        let json = serde_json::to_string(&msg).unwrap();
        let back: FeedMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
