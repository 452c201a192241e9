//! Sample-log container backend
//!
//! Writes an interleaved, length-prefixed sample log to disk. This is the
//! development container: every appended sample lands in one file, in append
//! order, with its track id and presentation time, and the trailer records
//! totals so a truncated file is detectable. A codec-aware container (MP4/MOV)
//! can replace this behind the same [`ContainerBackend`] trait.
//!
//! Layout:
//!
//! ```text
//! "RWSL" u8(version)
//! 'T' u32(track_id) u8(kind) u32(len) descriptor-json
//! 'B'                                      -- start_writing
//! 'Z' i64(value) u32(timescale)            -- start_session
//! 'S' u32(track_id) i64(value) u32(timescale) u32(len) payload
//! 'E' u64(sample_count) u64(payload_bytes)
//! ```

use super::{AppendOutcome, ContainerBackend, MuxerError, MuxerResult, TrackHandle};
use crate::media::{MediaKind, MediaTime, Sample, TrackDescriptor};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"RWSL";
const VERSION: u8 = 1;

/// File-backed sample log implementing [`ContainerBackend`]
pub struct SampleLogBackend {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    next_track_id: u32,
    samples_written: u64,
    payload_bytes: u64,
}

impl SampleLogBackend {
    /// Create a backend; the file is created on `open`
    pub fn new() -> Self {
        Self {
            writer: None,
            path: None,
            next_track_id: 0,
            samples_written: 0,
            payload_bytes: 0,
        }
    }

    fn writer(&mut self) -> MuxerResult<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| MuxerError::Append("container not open".into()))
    }

    fn path_display(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unopened>".into())
    }

    fn validate(descriptor: &TrackDescriptor) -> MuxerResult<()> {
        // The can-apply check: reject incompatible settings before the track
        // is committed to the container.
        let fields = &descriptor.format.fields;
        match descriptor.kind {
            MediaKind::Video => {
                if !fields.contains_key("width") || !fields.contains_key("height") {
                    return Err(MuxerError::TrackConfiguration(
                        "video format requires width and height".into(),
                    ));
                }
            }
            MediaKind::Audio => {
                if !fields.contains_key("sampleRate") {
                    return Err(MuxerError::TrackConfiguration(
                        "audio format requires sampleRate".into(),
                    ));
                }
            }
        }
        if let Some(codec) = descriptor.encoder_settings.get("codec") {
            if !codec.is_string() {
                return Err(MuxerError::TrackConfiguration(
                    "codec setting must be a string".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for SampleLogBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBackend for SampleLogBackend {
    fn open(&mut self, destination: &Path) -> MuxerResult<()> {
        let file = File::create(destination).map_err(|e| {
            MuxerError::Open(format!(
                "Failed to create {}: {}",
                destination.display(),
                e
            ))
        })?;
        let mut writer = BufWriter::with_capacity(1024 * 1024, file);
        writer
            .write_all(MAGIC)
            .and_then(|_| writer.write_all(&[VERSION]))
            .map_err(|e| MuxerError::Open(format!("Failed to write header: {}", e)))?;

        self.writer = Some(writer);
        self.path = Some(destination.to_path_buf());
        tracing::info!("Sample log opened: {}", destination.display());
        Ok(())
    }

    fn add_track(&mut self, descriptor: &TrackDescriptor) -> MuxerResult<TrackHandle> {
        Self::validate(descriptor)?;

        let id = self.next_track_id;
        let json = serde_json::to_vec(descriptor).map_err(|e| {
            MuxerError::TrackConfiguration(format!("Unserializable descriptor: {}", e))
        })?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| MuxerError::TrackConfiguration("container not open".into()))?;
        let kind_byte = match descriptor.kind {
            MediaKind::Video => 0u8,
            MediaKind::Audio => 1u8,
        };
        writer
            .write_all(b"T")
            .and_then(|_| writer.write_all(&id.to_le_bytes()))
            .and_then(|_| writer.write_all(&[kind_byte]))
            .and_then(|_| writer.write_all(&(json.len() as u32).to_le_bytes()))
            .and_then(|_| writer.write_all(&json))
            .map_err(|e| MuxerError::TrackConfiguration(format!("Failed to write track: {}", e)))?;

        self.next_track_id += 1;
        Ok(TrackHandle(id))
    }

    fn start_writing(&mut self) -> MuxerResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| MuxerError::WriteStart("container not open".into()))?;
        writer
            .write_all(b"B")
            .map_err(|e| MuxerError::WriteStart(format!("Failed to write marker: {}", e)))
    }

    fn start_session(&mut self, at: MediaTime) -> MuxerResult<()> {
        let writer = self.writer()?;
        writer
            .write_all(b"Z")
            .and_then(|_| writer.write_all(&at.value.to_le_bytes()))
            .and_then(|_| writer.write_all(&at.timescale.to_le_bytes()))
            .map_err(|e| MuxerError::Append(format!("Failed to write session start: {}", e)))
    }

    fn append(&mut self, track: TrackHandle, sample: &Sample) -> MuxerResult<AppendOutcome> {
        let path = self.path_display();
        let writer = self.writer()?;
        writer
            .write_all(b"S")
            .and_then(|_| writer.write_all(&track.0.to_le_bytes()))
            .and_then(|_| writer.write_all(&sample.pts.value.to_le_bytes()))
            .and_then(|_| writer.write_all(&sample.pts.timescale.to_le_bytes()))
            .and_then(|_| writer.write_all(&(sample.payload.len() as u32).to_le_bytes()))
            .and_then(|_| writer.write_all(&sample.payload))
            .map_err(|e| MuxerError::Append(format!("Failed to write to {}: {}", path, e)))?;

        self.samples_written += 1;
        self.payload_bytes += sample.payload.len() as u64;

        if self.samples_written % 100 == 0 {
            tracing::debug!(
                samples = self.samples_written,
                bytes = self.payload_bytes,
                "Sample log progress"
            );
        }
        Ok(AppendOutcome::Appended)
    }

    fn finish(&mut self) -> MuxerResult<()> {
        let samples = self.samples_written;
        let bytes = self.payload_bytes;
        let path = self.path_display();

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| MuxerError::Finish("container not open".into()))?;
        writer
            .write_all(b"E")
            .and_then(|_| writer.write_all(&samples.to_le_bytes()))
            .and_then(|_| writer.write_all(&bytes.to_le_bytes()))
            .and_then(|_| writer.flush())
            .map_err(|e| MuxerError::Finish(format!("Failed to finalize {}: {}", path, e)))?;

        // Drop the writer so the file handle closes with the container
        self.writer = None;
        tracing::info!(samples, bytes, "Sample log finalized: {}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FormatDescription;
    use serde_json::Map;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn audio_descriptor() -> TrackDescriptor {
        TrackDescriptor::new(
            MediaKind::Audio,
            FormatDescription::audio(44_100, 2),
            Map::new(),
        )
    }

    #[test]
    fn test_writes_non_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rwsl");

        let mut backend = SampleLogBackend::new();
        backend.open(&path).unwrap();
        let track = backend.add_track(&audio_descriptor()).unwrap();
        backend.start_writing().unwrap();
        backend.start_session(MediaTime::ZERO).unwrap();

        let sample = Sample::audio(
            MediaTime::new(441, 44_100),
            Arc::from(vec![7u8; 64].into_boxed_slice()),
        );
        assert_eq!(
            backend.append(track, &sample).unwrap(),
            AppendOutcome::Appended
        );
        backend.finish().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert!(data.len() > 64);
        assert_eq!(&data[..4], MAGIC);
        assert_eq!(data[data.len() - 17], b'E');
    }

    #[test]
    fn test_open_invalid_path_is_typed_error() {
        let mut backend = SampleLogBackend::new();
        let err = backend
            .open(Path::new("/nonexistent-dir/out.rwsl"))
            .unwrap_err();
        assert!(matches!(err, MuxerError::Open(_)));
    }

    #[test]
    fn test_incompatible_settings_rejected() {
        let dir = tempdir().unwrap();
        let mut backend = SampleLogBackend::new();
        backend.open(&dir.path().join("out.rwsl")).unwrap();

        let mut settings = Map::new();
        settings.insert("codec".into(), 42.into());
        let bad = TrackDescriptor::new(
            MediaKind::Audio,
            FormatDescription::audio(44_100, 2),
            settings,
        );
        assert!(matches!(
            backend.add_track(&bad),
            Err(MuxerError::TrackConfiguration(_))
        ));
    }

    #[test]
    fn test_finish_without_session_is_valid_empty_container() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.rwsl");

        let mut backend = SampleLogBackend::new();
        backend.open(&path).unwrap();
        backend.add_track(&audio_descriptor()).unwrap();
        backend.start_writing().unwrap();
        backend.finish().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[..4], MAGIC);
        assert_eq!(data[data.len() - 17], b'E');
    }
}
