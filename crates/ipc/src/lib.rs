//! Protocol models for the HomeMatch daemon.
//!
//! One JSON object per line on stdin/stdout, tagged by `"type"`. The
//! presentation layer sends `search` / `select` / `end_session` / `status`
//! requests and renders whatever comes back; all session state stays inside
//! the daemon.

use core_types::{GalleryEntry, PreferenceQuery, SelectionEvent, SessionKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Search(SearchRequest),
    Select(SelectRequest),
    EndSession { session: SessionKey },
    Status,
}

/// Raw form fields; `features` is the comma-separated text box.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Omitted on the first search; the daemon assigns one and echoes it back.
    #[serde(default)]
    pub session: Option<SessionKey>,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub bedrooms: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub property_type: String,
}

impl SearchRequest {
    pub fn preferences(&self) -> PreferenceQuery {
        PreferenceQuery::from_raw(
            &self.budget,
            &self.bedrooms,
            &self.neighborhood,
            &self.features,
            &self.property_type,
        )
    }
}

/// Selection event: `{ "session": ..., "index": N }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectRequest {
    pub session: SessionKey,
    pub index: i64,
}

impl SelectRequest {
    pub const fn event(&self) -> SelectionEvent {
        SelectionEvent { index: self.index }
    }
}

/// Gallery entry flattened for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryWire {
    pub asset_path: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    #[serde(default)]
    pub placeholder_asset: bool,
}

impl From<&GalleryEntry> for EntryWire {
    fn from(entry: &GalleryEntry) -> Self {
        let (asset_path, label) = entry.display_pair();
        let placeholder_asset = match entry {
            GalleryEntry::Listing { asset, .. } => asset.is_placeholder(),
            GalleryEntry::NoResults | GalleryEntry::Unavailable => true,
        };
        Self {
            asset_path,
            label,
            listing_id: entry.listing_id().map(ToString::to_string),
            placeholder_asset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub listings: usize,
    pub vectors: usize,
    pub dimension: usize,
    pub backend: String,
    pub sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    SearchResults {
        session: SessionKey,
        sequence: u64,
        entries: Vec<EntryWire>,
    },
    Description {
        session: SessionKey,
        text: String,
    },
    SessionEnded {
        session: SessionKey,
        existed: bool,
    },
    Status(StatusResponse),
    Error {
        message: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Line framing helpers.
pub mod framing {
    use super::{Request, Response};

    pub fn decode_request(line: &str) -> Result<Request, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// Encode one response line (no trailing newline).
    pub fn encode_response(resp: &Response) -> String {
        serde_json::to_string(resp).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"failed to encode response: {e}"}}"#)
        })
    }
}
