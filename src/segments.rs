//! Building segment lists from command-line sources.

use cl_core::{Error, Result, Segment, SegmentId};

/// Identifier for the segment at `index`, derived from its source.
///
/// The index prefix keeps ids unique when the same file appears twice.
pub fn segment_id_for(index: usize, source: &str) -> SegmentId {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    let name = path
        .rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or(path);
    SegmentId::new(format!("{index}:{name}"))
}

/// Pair each source with its declared duration, if any.
///
/// `declared` may be shorter than `sources`; the remaining segments start
/// with no declared duration.
pub fn build_segments(sources: &[String], declared: &[f64]) -> Result<Vec<Segment>> {
    if sources.is_empty() {
        return Err(Error::EmptyTimeline);
    }
    if declared.len() > sources.len() {
        return Err(Error::Validation(format!(
            "{} declared durations for {} sources",
            declared.len(),
            sources.len()
        )));
    }
    if let Some(bad) = declared.iter().find(|d| !d.is_finite() || **d < 0.0) {
        return Err(Error::Validation(format!("invalid declared duration: {bad}")));
    }

    Ok(sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let segment = Segment::new(segment_id_for(i, source), source.clone());
            match declared.get(i) {
                Some(&seconds) => segment.with_declared_duration(seconds),
                None => segment,
            }
        })
        .collect())
}
