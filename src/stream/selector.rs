//! Source ranking.
//!
//! Progressive files start faster and seek without a playlist round-trip,
//! so they are preferred over playlists whenever any exist. Within the
//! preferred set the tallest resolution wins; equal heights keep their
//! original order.

use std::collections::HashSet;

use super::source::SourceDescriptor;

/// Index of the default source. `None` only for an empty list.
pub fn pick(sources: &[SourceDescriptor]) -> Option<usize> {
    rank(sources, |_| true)
}

/// The default source itself.
pub fn pick_source(sources: &[SourceDescriptor]) -> Option<&SourceDescriptor> {
    pick(sources).map(|i| &sources[i])
}

/// Best index not yet in `tried`.
pub fn next_candidate(sources: &[SourceDescriptor], tried: &HashSet<usize>) -> Option<usize> {
    rank(sources, |i| !tried.contains(&i))
}

/// Source whose quality label matches `label` (case-insensitive). A `None`
/// label matches the first source without a quality.
pub fn find_by_quality(sources: &[SourceDescriptor], label: Option<&str>) -> Option<usize> {
    sources.iter().position(|s| match (label, s.quality.as_deref()) {
        (Some(wanted), Some(have)) => wanted.trim().eq_ignore_ascii_case(have.trim()),
        (None, None) => true,
        _ => false,
    })
}

fn rank(sources: &[SourceDescriptor], eligible: impl Fn(usize) -> bool) -> Option<usize> {
    let candidates: Vec<usize> = (0..sources.len()).filter(|&i| eligible(i)).collect();
    if candidates.is_empty() {
        return None;
    }

    let progressive: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&i| sources[i].container.is_progressive())
        .collect();
    let pool = if progressive.is_empty() {
        candidates
    } else {
        progressive
    };

    // max_by_key keeps the last maximum; scan in reverse to keep the first.
    let tallest = pool
        .iter()
        .rev()
        .copied()
        .max_by_key(|&i| sources[i].resolved_height().unwrap_or(0))?;
    if sources[tallest].resolved_height().unwrap_or(0) > 0 {
        return Some(tallest);
    }

    pool.iter()
        .copied()
        .find(|&i| sources[i].is_auto())
        .or_else(|| pool.first().copied())
}
