//! Pure-Rust container duration probing.
//!
//! Uses the `matroska` crate for MKV/WebM and `mp4parse` for MP4/M4A. Only
//! header metadata is consulted; no frames are decoded.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cl_core::Container;

use crate::prober::{is_remote, DurationProber};

/// A [`DurationProber`] for local files and in-memory bytes.
///
/// Accepts plain paths and `file://` URLs. Remote sources are left to
/// [`HttpProber`](crate::HttpProber), which reuses [`duration_from_bytes`].
pub struct ContainerProber;

impl ContainerProber {
    /// Create a new `ContainerProber`.
    pub fn new() -> Self {
        Self
    }
}

impl Default for ContainerProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurationProber for ContainerProber {
    fn name(&self) -> &'static str {
        "container"
    }

    fn supports(&self, source: &str) -> bool {
        !is_remote(source)
    }

    async fn probe(&self, source: &str) -> cl_core::Result<f64> {
        let path = local_path(source);
        tokio::task::spawn_blocking(move || duration_from_file(&path))
            .await
            .map_err(|e| cl_core::Error::Internal(format!("probe task failed: {e}")))?
    }
}

/// Map a local source to a filesystem path.
fn local_path(source: &str) -> PathBuf {
    PathBuf::from(source.strip_prefix("file://").unwrap_or(source))
}

/// Read the duration of a local media file.
pub fn duration_from_file(path: &Path) -> cl_core::Result<f64> {
    let mut file = File::open(path).map_err(|e| cl_core::Error::Probe(e.to_string()))?;

    let mut magic = [0u8; 12];
    let read = file
        .read(&mut magic)
        .map_err(|e| cl_core::Error::Probe(e.to_string()))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| cl_core::Error::Probe(e.to_string()))?;

    let hint = path.extension().and_then(|e| e.to_str());
    match detect_container(&magic[..read], hint)? {
        Container::Mkv => mkv_duration(BufReader::new(file)),
        Container::Mp4 => {
            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer)
                .map_err(|e| cl_core::Error::Probe(e.to_string()))?;
            mp4_duration(&buffer)
        }
    }
}

/// Read the duration of media held in memory.
///
/// `hint` is a file extension used when the magic bytes are inconclusive.
pub fn duration_from_bytes(bytes: &[u8], hint: Option<&str>) -> cl_core::Result<f64> {
    let magic = &bytes[..bytes.len().min(12)];
    match detect_container(magic, hint)? {
        Container::Mkv => mkv_duration(Cursor::new(bytes)),
        Container::Mp4 => mp4_duration(bytes),
    }
}

// ---------------------------------------------------------------------------
// Container detection
// ---------------------------------------------------------------------------

/// Detect container format from magic bytes, with extension fallback.
pub(crate) fn detect_container(magic: &[u8], hint: Option<&str>) -> cl_core::Result<Container> {
    if magic.len() >= 8 {
        // EBML header (Matroska/WebM).
        if magic[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
            return Ok(Container::Mkv);
        }
        // Top-level ISO BMFF box.
        if &magic[4..8] == b"ftyp"
            || &magic[4..8] == b"moov"
            || &magic[4..8] == b"mdat"
            || &magic[4..8] == b"free"
        {
            return Ok(Container::Mp4);
        }
    }

    match hint {
        Some(ext) => Container::from_extension(ext).ok_or_else(|| {
            cl_core::Error::Probe(format!("unsupported container extension: {ext}"))
        }),
        None => Err(cl_core::Error::Probe(
            "unable to detect container format".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Matroska
// ---------------------------------------------------------------------------

fn mkv_duration<R: Read + Seek>(reader: R) -> cl_core::Result<f64> {
    let mkv = matroska::Matroska::open(reader)
        .map_err(|e| cl_core::Error::Probe(format!("MKV parse error: {e}")))?;

    // Live recordings (e.g. MediaRecorder WebM) often omit the duration.
    mkv.info
        .duration
        .map(|d| d.as_secs_f64())
        .filter(|secs| *secs > 0.0)
        .ok_or_else(|| cl_core::Error::Probe("MKV header carries no duration".into()))
}

// ---------------------------------------------------------------------------
// MP4
// ---------------------------------------------------------------------------

fn mp4_duration(bytes: &[u8]) -> cl_core::Result<f64> {
    let mut cursor = Cursor::new(bytes);
    let context = mp4parse::read_mp4(&mut cursor)
        .map_err(|e| cl_core::Error::Probe(format!("MP4 parse error: {e:?}")))?;

    compute_mp4_duration(&context)
        .ok_or_else(|| cl_core::Error::Probe("MP4 tracks carry no duration".into()))
}

fn compute_mp4_duration(context: &mp4parse::MediaContext) -> Option<f64> {
    let global_ts = context.timescale?;
    context.tracks.iter().find_map(|t| {
        let dur = t.duration?;
        let scale = t.timescale.map(|s| s.0).unwrap_or(global_ts.0);
        if scale == 0 {
            return None;
        }
        let secs = dur.0 as f64 / scale as f64;
        (secs > 0.0).then_some(secs)
    })
}
