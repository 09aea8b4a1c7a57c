//! Data models for anno
//!
//! Defines the core data structures: `Annotation`, `NoteContent`, and
//! `Highlight`. The `Annotation` serde field names match the annotation
//! server's wire format, so the same struct serves both the sqlite rows
//! and the JSON protocol.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefix for deterministically derived annotation identities
pub const UUID_PREFIX: &str = "urn:sugaruuid:";

/// Current wall-clock time as fractional seconds since the epoch
///
/// Timestamps travel over the wire as floats, so that is also how they
/// are stored.
pub fn epoch_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// One user annotation attached to a page of one document
///
/// Identity rules:
/// - `id` is assigned by the local store and is only unique locally.
///   It must never be compared across stores.
/// - `uuid` is the cross-store identity, derived once from
///   `(creator, filehash, id)` and stable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    /// Local row id, assigned by the store on insert
    pub id: i64,
    /// Content hash of the document this annotation belongs to
    #[serde(rename = "md5")]
    pub filehash: String,
    /// Zero-based page index
    pub page: u32,
    /// Note title
    pub title: String,
    /// Note body
    #[serde(rename = "content")]
    pub body: String,
    /// URL of externally hosted body content, empty until pushed
    #[serde(rename = "bodyurl", default, deserialize_with = "null_to_empty")]
    pub body_url: String,
    /// Title of the annotated document
    #[serde(rename = "texttitle", default, deserialize_with = "null_to_empty")]
    pub text_title: String,
    /// Author of the annotated document
    #[serde(rename = "textcreator", default, deserialize_with = "null_to_empty")]
    pub text_creator: String,
    /// Creation time, seconds since epoch
    pub created: f64,
    /// Last modification time, seconds since epoch
    pub modified: f64,
    /// Opaque user id of the annotation author, empty if unresolved
    #[serde(default, deserialize_with = "null_to_empty")]
    pub creator: String,
    /// External target URL this annotation semantically annotates,
    /// empty when the document has no known target
    #[serde(default, deserialize_with = "null_to_empty")]
    pub annotates: String,
    /// User-identity color tag, serialized as its string encoding
    #[serde(default, deserialize_with = "null_to_empty")]
    pub color: String,
    /// True if this annotation originated on this device
    #[serde(
        serialize_with = "bool_as_int",
        deserialize_with = "int_as_bool",
        default = "default_local"
    )]
    pub local: bool,
    /// Mime type of the source document at creation time
    #[serde(default, deserialize_with = "null_to_empty")]
    pub mimetype: String,
    /// Cross-store identity, empty until derived
    #[serde(default, deserialize_with = "null_to_empty")]
    pub uuid: String,
    /// URL assigned by the remote store once pushed
    #[serde(rename = "annotationurl", default, deserialize_with = "null_to_empty")]
    pub annotation_url: String,
}

impl Annotation {
    /// Derive the stable cross-store identity if it is still unset
    ///
    /// No-op unless both `creator` and `filehash` are known; annotations
    /// created before identity resolution completes stay without a uuid
    /// until the store adopts them.
    pub fn make_uuid(&mut self) {
        if self.uuid.is_empty() && !self.creator.is_empty() && !self.filehash.is_empty() {
            self.uuid = format!(
                "{}{}-{}-{}",
                UUID_PREFIX, self.creator, self.filehash, self.id
            );
        }
    }

    /// Does this annotation live on the given page?
    pub fn belongs_to_page(&self, page: u32) -> bool {
        self.page == page
    }

    /// Serialize to the flat wire representation
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Title and body of a note, as entered by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NoteContent {
    pub title: String,
    pub body: String,
}

impl NoteContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A text-range highlight on one page
///
/// Highlights have no identity beyond value equality; duplicates are
/// prevented by policy in the store, not by a uniqueness constraint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Highlight {
    pub start: i64,
    pub end: i64,
}

impl Highlight {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

fn default_local() -> bool {
    true
}

/// The wire encodes `local` as 0/1
fn bool_as_int<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(i64::from(*value))
}

fn int_as_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrBool {
        Int(i64),
        Bool(bool),
    }

    Ok(match IntOrBool::deserialize(deserializer)? {
        IntOrBool::Int(n) => n != 0,
        IntOrBool::Bool(b) => b,
    })
}

/// Older servers send `null` where we expect an empty string
pub(crate) fn null_to_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
