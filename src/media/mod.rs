//! Media data model
//!
//! Track descriptors, samples, and rational time shared by the recorder and
//! the muxer port. Everything here is immutable once a recording starts, so
//! these types are safely read from any capture thread without locking.

pub mod time;

pub use time::MediaTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Kind of media a track or sample carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video frames
    Video,
    /// Audio chunks
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Opaque format token negotiated by the capture side
///
/// The recorder never interprets the fields beyond the media kind; they are
/// passed through to the container backend (dimensions, pixel format, sample
/// rate, channel count, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescription {
    /// Media kind this format describes
    pub kind: MediaKind,

    /// Format fields, opaque to the recorder
    pub fields: Map<String, Value>,
}

impl FormatDescription {
    /// Create a format description with no fields
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            fields: Map::new(),
        }
    }

    /// Create a video format description with the usual dimension fields
    pub fn video(width: u32, height: u32) -> Self {
        let mut fields = Map::new();
        fields.insert("width".into(), width.into());
        fields.insert("height".into(), height.into());
        Self {
            kind: MediaKind::Video,
            fields,
        }
    }

    /// Create an audio format description with the usual PCM fields
    pub fn audio(sample_rate: u32, channels: u16) -> Self {
        let mut fields = Map::new();
        fields.insert("sampleRate".into(), sample_rate.into());
        fields.insert("channels".into(), channels.into());
        Self {
            kind: MediaKind::Audio,
            fields,
        }
    }
}

/// Immutable description of one output track
///
/// Supplied once per kind before `prepare_to_record`; the encoder settings map
/// is opaque to the recorder and validated by the container backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    /// Media kind of the track
    pub kind: MediaKind,

    /// Negotiated format description
    pub format: FormatDescription,

    /// Encoder settings (codec, bitrate, ...), opaque key/value map
    pub encoder_settings: Map<String, Value>,
}

impl TrackDescriptor {
    /// Build a descriptor, checking the format kind matches the track kind
    pub fn new(
        kind: MediaKind,
        format: FormatDescription,
        encoder_settings: Map<String, Value>,
    ) -> Self {
        debug_assert_eq!(kind, format.kind, "format kind must match track kind");
        Self {
            kind,
            format,
            encoder_settings,
        }
    }
}

/// One timestamped unit of media data
///
/// The payload is shared, not copied: capture callbacks hand the recorder an
/// `Arc` slice and the recorder holds it only until the muxer has ingested it.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Media kind of the sample
    pub kind: MediaKind,

    /// Presentation timestamp
    pub pts: MediaTime,

    /// Encoded or raw payload bytes
    pub payload: Arc<[u8]>,
}

impl Sample {
    /// Create a sample from shared payload bytes
    pub fn new(kind: MediaKind, pts: MediaTime, payload: Arc<[u8]>) -> Self {
        Self { kind, pts, payload }
    }

    /// Create a video sample
    pub fn video(pts: MediaTime, payload: Arc<[u8]>) -> Self {
        Self::new(MediaKind::Video, pts, payload)
    }

    /// Create an audio sample
    pub fn audio(pts: MediaTime, payload: Arc<[u8]>) -> Self {
        Self::new(MediaKind::Audio, pts, payload)
    }
}
