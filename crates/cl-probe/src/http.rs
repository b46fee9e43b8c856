//! Duration probing for remote sources.

use async_trait::async_trait;
use cl_core::config::ProbeConfig;
use reqwest::header::RANGE;

use crate::container::{detect_container, duration_from_bytes};
use crate::prober::{extension_hint, is_remote, DurationProber};

/// A [`DurationProber`] for `http://` and `https://` sources.
///
/// Asks for the first `header_bytes` of the resource with a ranged GET and
/// parses the container header from memory. When the header does not fit
/// (an MP4 with its `moov` box at the end, say) the range is widened
/// fourfold, never past `max_bytes`. An expired signed URL and a network
/// failure both surface as plain errors; telling them apart is the caller's
/// job.
pub struct HttpProber {
    client: reqwest::Client,
    header_bytes: u64,
    max_bytes: u64,
}

impl HttpProber {
    /// Create a prober from probe settings.
    pub fn new(config: &ProbeConfig) -> cl_core::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| cl_core::Error::Http(e.to_string()))?;
        Ok(Self::with_client(
            client,
            config.first_range_bytes(),
            config.max_bytes,
        ))
    }

    /// Create a prober around an existing client.
    pub fn with_client(client: reqwest::Client, header_bytes: u64, max_bytes: u64) -> Self {
        let max_bytes = max_bytes.max(1);
        Self {
            client,
            header_bytes: header_bytes.clamp(1, max_bytes),
            max_bytes,
        }
    }

    /// Fetch the first `len` bytes of `source`.
    ///
    /// Servers that ignore `Range` answer with the whole body; reading stops
    /// at `len` either way.
    async fn fetch_prefix(&self, source: &str, len: u64) -> cl_core::Result<Vec<u8>> {
        let mut response = self
            .client
            .get(source)
            .header(RANGE, format!("bytes=0-{}", len.saturating_sub(1)))
            .send()
            .await
            .map_err(|e| cl_core::Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(cl_core::Error::Http(format!("{status} fetching {source}")));
        }

        let limit = usize::try_from(len).unwrap_or(usize::MAX);
        let capacity = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0)
            .min(limit);
        let mut body = Vec::with_capacity(capacity);

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| cl_core::Error::Http(e.to_string()))?
        {
            let room = limit - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                tracing::trace!(source, limit, "probe read stopped at range end");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[async_trait]
impl DurationProber for HttpProber {
    fn name(&self) -> &'static str {
        "http"
    }

    fn supports(&self, source: &str) -> bool {
        is_remote(source)
    }

    async fn probe(&self, source: &str) -> cl_core::Result<f64> {
        let hint = extension_hint(source).map(str::to_owned);
        let mut len = self.header_bytes;

        loop {
            let body = self.fetch_prefix(source, len).await?;
            // A short read means the whole resource is in hand.
            let complete = (body.len() as u64) < len;
            detect_container(&body[..body.len().min(12)], hint.as_deref())?;

            let parse_hint = hint.clone();
            let parsed =
                tokio::task::spawn_blocking(move || duration_from_bytes(&body, parse_hint.as_deref()))
                    .await
                    .map_err(|e| cl_core::Error::Internal(format!("probe task failed: {e}")))?;

            match parsed {
                Ok(seconds) => return Ok(seconds),
                Err(e) if complete || len >= self.max_bytes => return Err(e),
                Err(e) => {
                    let wider = len.saturating_mul(4).min(self.max_bytes);
                    tracing::debug!(source, from = len, to = wider, error = %e, "widening probe range");
                    len = wider;
                }
            }
        }
    }
}
