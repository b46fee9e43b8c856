//! A composite prober that delegates to multiple [`DurationProber`] implementations.

use async_trait::async_trait;

use crate::prober::DurationProber;

/// Tries each registered [`DurationProber`] in order and returns the first
/// successful result.
///
/// This allows layering strategies, e.g. local files through the container
/// prober and signed URLs through the HTTP prober.
pub struct CompositeProber {
    probers: Vec<Box<dyn DurationProber>>,
}

impl CompositeProber {
    /// Create a new `CompositeProber` from an ordered list of probers.
    ///
    /// Probers are tried in the order provided. The first prober whose
    /// [`DurationProber::supports`] returns `true` and whose
    /// [`DurationProber::probe`] succeeds will have its result returned.
    pub fn new(probers: Vec<Box<dyn DurationProber>>) -> Self {
        Self { probers }
    }
}

#[async_trait]
impl DurationProber for CompositeProber {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn supports(&self, source: &str) -> bool {
        self.probers.iter().any(|p| p.supports(source))
    }

    async fn probe(&self, source: &str) -> cl_core::Result<f64> {
        let mut last_err = None;

        for prober in &self.probers {
            if !prober.supports(source) {
                continue;
            }

            match prober.probe(source).await {
                Ok(seconds) => return Ok(seconds),
                Err(e) => {
                    tracing::debug!(
                        prober = prober.name(),
                        error = %e,
                        "prober failed, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            cl_core::Error::Probe(format!("no prober supports source: {source}"))
        }))
    }
}
