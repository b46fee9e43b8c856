//! Concurrent duration resolution for a whole segment list.
//!
//! Every segment settles exactly once, either with a probed duration or with
//! a fallback (declared duration, else 0). A failing probe never affects its
//! siblings, and progress is reported after each settlement in the order the
//! probes finish.

use std::sync::Arc;
use std::time::Duration;

use cl_core::config::ProbeConfig;
use cl_core::{Segment, SegmentId};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::ReceiverStream;

use crate::prober::DurationProber;

/// How a single segment's duration was settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The probe reported a real duration.
    Resolved { seconds: f64 },
    /// The probe failed or could not run; `seconds` is the fallback.
    Fallback { seconds: f64, reason: String },
}

impl ProbeOutcome {
    /// Duration this outcome settles on.
    pub fn seconds(&self) -> f64 {
        match self {
            Self::Resolved { seconds } | Self::Fallback { seconds, .. } => *seconds,
        }
    }

    /// Whether a real duration was obtained.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Emitted once per settled probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Timeline index of the settled segment.
    pub index: usize,
    /// Identifier of the settled segment.
    pub segment_id: SegmentId,
    /// How it settled.
    pub outcome: ProbeOutcome,
    /// Probes settled so far, including this one.
    pub completed: usize,
    /// Total number of probes.
    pub total: usize,
}

impl ProgressEvent {
    /// `completed / total`, reaching exactly 1.0 on the last event.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    /// Whether this is the final event of the run.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Runs duration probes for a segment list.
#[derive(Clone)]
pub struct DurationResolver {
    prober: Arc<dyn DurationProber>,
    concurrency: usize,
    timeout: Option<Duration>,
}

impl DurationResolver {
    /// Create a resolver with unbounded concurrency and no timeout.
    pub fn new(prober: Arc<dyn DurationProber>) -> Self {
        Self {
            prober,
            concurrency: 0,
            timeout: None,
        }
    }

    /// Create a resolver from probe settings.
    pub fn from_config(prober: Arc<dyn DurationProber>, config: &ProbeConfig) -> Self {
        Self::new(prober)
            .with_concurrency(config.concurrency)
            .with_timeout(config.timeout())
    }

    /// Builder: cap the number of probes in flight (0 = unbounded).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builder: abandon probes that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe every segment concurrently.
    ///
    /// Must be called from within a tokio runtime. The returned stream yields
    /// one [`ProgressEvent`] per segment and then ends. Dropping the stream
    /// does not cancel probes already in flight.
    pub fn resolve_all(&self, segments: &[Segment]) -> ReceiverStream<ProgressEvent> {
        let total = segments.len();
        let (tx, rx) = mpsc::channel(total.max(1));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(usize, SegmentId, ProbeOutcome)>();

        let semaphore = (self.concurrency > 0).then(|| Arc::new(Semaphore::new(self.concurrency)));

        for (index, segment) in segments.iter().enumerate() {
            let id = segment.id.clone();
            let fallback = segment.fallback_duration();

            let Some(source) = segment.source_url.clone() else {
                tracing::debug!(segment_id = %id, "segment has no source; using fallback duration");
                let _ = done_tx.send((
                    index,
                    id,
                    ProbeOutcome::Fallback {
                        seconds: fallback,
                        reason: "segment has no source".into(),
                    },
                ));
                continue;
            };

            let prober = Arc::clone(&self.prober);
            let semaphore = semaphore.clone();
            let timeout = self.timeout;
            let done_tx = done_tx.clone();

            tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };

                // Run the probe in its own task so a panicking prober still
                // settles this segment.
                let probe_source = source.clone();
                let handle = tokio::spawn(async move {
                    match timeout {
                        Some(limit) => match tokio::time::timeout(limit, prober.probe(&probe_source)).await {
                            Ok(result) => result,
                            Err(_) => Err(cl_core::Error::Probe(format!(
                                "timed out after {}s",
                                limit.as_secs_f64()
                            ))),
                        },
                        None => prober.probe(&probe_source).await,
                    }
                });

                let outcome = match handle.await {
                    Ok(Ok(seconds)) if seconds.is_finite() && seconds > 0.0 => {
                        ProbeOutcome::Resolved { seconds }
                    }
                    Ok(Ok(seconds)) => ProbeOutcome::Fallback {
                        seconds: fallback,
                        reason: format!("probe returned unusable duration {seconds}"),
                    },
                    Ok(Err(e)) => ProbeOutcome::Fallback {
                        seconds: fallback,
                        reason: e.to_string(),
                    },
                    Err(e) => ProbeOutcome::Fallback {
                        seconds: fallback,
                        reason: format!("probe task failed: {e}"),
                    },
                };

                if let ProbeOutcome::Fallback { reason, .. } = &outcome {
                    tracing::warn!(segment_id = %id, %source, %reason, "probe failed; using fallback duration");
                }

                let _ = done_tx.send((index, id, outcome));
            });
        }
        drop(done_tx);

        tokio::spawn(async move {
            let mut completed = 0;
            while let Some((index, segment_id, outcome)) = done_rx.recv().await {
                completed += 1;
                let event = ProgressEvent {
                    index,
                    segment_id,
                    outcome,
                    completed,
                    total,
                };
                if tx.send(event).await.is_err() {
                    // Receiver gone; keep draining so probes are not blocked.
                    continue;
                }
            }
            tracing::debug!(total, "duration resolution finished");
        });

        ReceiverStream::new(rx)
    }
}
