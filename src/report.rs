//! Human and JSON rendering for CLI output.

use cl_core::events::{TransportChange, TransportEvent};
use cl_core::{Segment, Transport};
use cl_probe::{ProbeOutcome, ProgressEvent};
use cl_timeline::Timeline;
use serde::Serialize;

/// Format seconds as `HH:MM:SS.mmm`.
pub fn format_seconds(seconds: f64) -> String {
    let millis = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let secs = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        millis % 1000
    )
}

/// One row of a timeline layout.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineRow {
    pub index: usize,
    pub segment_id: String,
    pub source: Option<String>,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    /// Whether the duration came from the media rather than a declaration.
    pub resolved: bool,
}

/// A timeline layout ready to print.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineReport {
    pub segments: Vec<TimelineRow>,
    pub total_duration: f64,
}

impl TimelineReport {
    pub fn new(timeline: &Timeline, segments: &[Segment]) -> Self {
        let rows = timeline
            .entries()
            .iter()
            .zip(segments)
            .enumerate()
            .map(|(index, (entry, segment))| TimelineRow {
                index,
                segment_id: entry.segment_id.to_string(),
                source: segment.source_url.clone(),
                start: entry.start,
                end: entry.end,
                duration: entry.duration(),
                resolved: segment.resolved_duration.is_some(),
            })
            .collect();

        Self {
            segments: rows,
            total_duration: timeline.total_duration(),
        }
    }

    /// Plain-text table.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in &self.segments {
            out.push_str(&format!(
                "  [{}] {} -> {}  {:>10.3}s  {}{}\n",
                row.index,
                format_seconds(row.start),
                format_seconds(row.end),
                row.duration,
                row.segment_id,
                if row.resolved { "" } else { " (declared)" }
            ));
        }
        out.push_str(&format!(
            "Total: {} ({:.3}s)\n",
            format_seconds(self.total_duration),
            self.total_duration
        ));
        out
    }
}

/// Result of probing one source.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeRow {
    pub source: String,
    pub seconds: Option<f64>,
    pub error: Option<String>,
}

impl ProbeRow {
    pub fn new(source: impl Into<String>, outcome: &ProbeOutcome) -> Self {
        let (seconds, error) = match outcome {
            ProbeOutcome::Resolved { seconds } => (Some(*seconds), None),
            ProbeOutcome::Fallback { reason, .. } => (None, Some(reason.clone())),
        };
        Self {
            source: source.into(),
            seconds,
            error,
        }
    }

    pub fn render(&self) -> String {
        match (&self.seconds, &self.error) {
            (Some(seconds), _) => format!("{}: {} ({seconds:.3}s)", self.source, format_seconds(*seconds)),
            (None, Some(error)) => format!("{}: failed: {error}", self.source),
            (None, None) => format!("{}: unknown", self.source),
        }
    }
}

/// One line describing a finished probe.
pub fn progress_line(event: &ProgressEvent) -> String {
    let outcome = match &event.outcome {
        ProbeOutcome::Resolved { seconds } => format!("{seconds:.3}s"),
        ProbeOutcome::Fallback { seconds, reason } => {
            format!("fallback {seconds:.3}s ({reason})")
        }
    };
    format!(
        "[{}/{}] {:>3.0}% {} {}",
        event.completed,
        event.total,
        event.progress() * 100.0,
        event.segment_id,
        outcome
    )
}

/// One line describing a transport change.
pub fn transport_line(event: &TransportEvent) -> String {
    let t = &event.snapshot;
    let what = match &event.change {
        TransportChange::StatusChanged { from, to } => format!("status {from} -> {to}"),
        TransportChange::TimeUpdate => "time".to_string(),
        TransportChange::SegmentChanged { from, to } => match from {
            Some(from) => format!("segment {from} -> {to}"),
            None => format!("segment -> {to}"),
        },
        TransportChange::Seeked { target } => format!("seeked to {}", format_seconds(*target)),
        TransportChange::DurationResolved {
            segment_id,
            seconds,
        } => format!("duration {segment_id} = {seconds:.3}s"),
        TransportChange::Failed { error } => format!("failed: {error}"),
        TransportChange::Destroyed => "destroyed".to_string(),
    };
    format!("{} {:<28} {}", position(t), what, t.status)
}

fn position(t: &Transport) -> String {
    let segment = t
        .active_segment_index
        .map(|i| i.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} / {} [seg {}]",
        format_seconds(t.global_time),
        format_seconds(t.total_duration),
        segment
    )
}
