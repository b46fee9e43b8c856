//! The [`DurationProber`] trait defining the interface for duration probing.

use async_trait::async_trait;

/// Discovers a segment's real duration from metadata, without playing it.
///
/// Implementations must be safe to share across tasks (`Send + Sync`); the
/// resolver runs many probes concurrently against one prober.
#[async_trait]
pub trait DurationProber: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Check whether this prober can handle `source`.
    ///
    /// A return value of `true` does not guarantee that
    /// [`DurationProber::probe`] will succeed.
    fn supports(&self, source: &str) -> bool;

    /// Probe `source` and return its duration in seconds.
    async fn probe(&self, source: &str) -> cl_core::Result<f64>;
}

/// Whether `source` names a remote HTTP(S) resource.
pub fn is_remote(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Extension of the last path component of `source`, ignoring any query
/// string or fragment.
pub fn extension_hint(source: &str) -> Option<&str> {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}
