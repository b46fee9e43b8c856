//! Duration resolution against a scripted prober.

mod common;

use std::sync::Arc;
use std::time::Duration;

use cl_core::Segment;
use cl_probe::{DurationResolver, ProbeOutcome, ProgressEvent};
use cl_timeline::SegmentRegistry;
use common::ScriptedProber;
use tokio_stream::StreamExt;

fn segments() -> Vec<Segment> {
    vec![
        Segment::new("a", "a.webm").with_declared_duration(9.0),
        Segment::new("b", "b.webm").with_declared_duration(12.0),
        Segment::new("c", "c.webm"),
    ]
}

#[tokio::test(start_paused = true)]
async fn one_failure_does_not_block_the_rest() {
    let prober = Arc::new(
        ScriptedProber::new()
            .ok("a.webm", 10.0)
            .fail("b.webm", "signature expired")
            .ok("c.webm", 15.0)
            .with_delay(Duration::from_millis(100)),
    );
    let resolver = DurationResolver::new(prober.clone()).with_concurrency(2);
    let segments = segments();

    let events: Vec<ProgressEvent> = resolver.resolve_all(&segments).collect().await;
    assert_eq!(events.len(), 3);
    let completed: Vec<usize> = events.iter().map(|e| e.completed).collect();
    assert_eq!(completed, vec![1, 2, 3]);
    assert_eq!(prober.max_in_flight(), 2);

    let mut registry = SegmentRegistry::register(segments).unwrap();
    for event in &events {
        match (&event.outcome, event.segment_id.as_str()) {
            (ProbeOutcome::Resolved { seconds }, _) => {
                registry.update_resolved_duration(&event.segment_id, *seconds);
            }
            (ProbeOutcome::Fallback { seconds, reason }, "b") => {
                assert_eq!(*seconds, 12.0);
                assert!(reason.contains("signature expired"), "got: {reason}");
            }
            (outcome, id) => panic!("unexpected outcome for {id}: {outcome:?}"),
        }
    }

    let timeline = registry.timeline();
    assert_eq!(timeline.total_duration(), 37.0);
    let bounds: Vec<(f64, f64)> = timeline.entries().iter().map(|e| (e.start, e.end)).collect();
    assert_eq!(bounds, vec![(0.0, 10.0), (10.0, 22.0), (22.0, 37.0)]);
}

#[tokio::test]
async fn every_probe_failing_falls_back_to_declared() {
    let prober = Arc::new(ScriptedProber::new());
    let resolver = DurationResolver::new(prober);
    let segments = segments();

    let events: Vec<ProgressEvent> = resolver.resolve_all(&segments).collect().await;
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| !e.outcome.is_resolved()));

    let mut by_id: Vec<(String, f64)> = events
        .iter()
        .map(|e| (e.segment_id.to_string(), e.outcome.seconds()))
        .collect();
    by_id.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        by_id,
        vec![("a".into(), 9.0), ("b".into(), 12.0), ("c".into(), 0.0)]
    );
}
