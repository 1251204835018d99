//! Rect reduction for text selections
//!
//! Native selection APIs report one client rect per inline fragment, so a
//! single visual line often arrives as several overlapping or touching boxes.
//! Painting all of them with partial opacity shows darker seams; these
//! helpers reduce the set to what is actually visible.

use serde::{Deserialize, Serialize};

use crate::error::{HighlightError, Result};

use super::types::Rect;

/// Slack for float noise in edge comparisons
const CONTAINMENT_TOLERANCE: f64 = 1e-9;

/// Tuning for [`optimize_client_rects`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Minimum vertical overlap, as a fraction of the shorter rect, for two
    /// rects to count as the same visual line
    pub line_overlap_ratio: f64,
    /// Largest horizontal gap in pixels that still counts as adjacent
    pub adjacency_epsilon: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            line_overlap_ratio: 0.5,
            adjacency_epsilon: 10.0,
        }
    }
}

/// Merge and filter raw selection rects into a minimal equivalent set.
///
/// Contained rects are dropped, same-line neighbours are merged into their
/// union, and both steps repeat until nothing changes. Survivors keep the
/// relative order of the input; a merged rect takes the earlier slot.
#[must_use]
pub fn optimize_client_rects(rects: &[Rect], config: &OptimizerConfig) -> Vec<Rect> {
    let mut rects = rects.to_vec();
    loop {
        let before = rects.len();
        drop_contained(&mut rects);
        merge_same_line(&mut rects, config);
        if rects.len() == before {
            return rects;
        }
    }
}

/// Smallest rect enclosing every rect in `rects`
pub fn get_bounding_rect(rects: &[Rect]) -> Result<Rect> {
    let (first, rest) = rects.split_first().ok_or(HighlightError::EmptyInput)?;
    Ok(rest.iter().fold(*first, |acc, rect| acc.union(rect)))
}

fn drop_contained(rects: &mut Vec<Rect>) {
    let keep: Vec<bool> = rects
        .iter()
        .enumerate()
        .map(|(i, rect)| {
            !rects.iter().enumerate().any(|(j, other)| {
                // Identical rects contain each other; the first one wins.
                j != i
                    && other.contains(rect, CONTAINMENT_TOLERANCE)
                    && (j < i || !rect.contains(other, CONTAINMENT_TOLERANCE))
            })
        })
        .collect();

    let mut flags = keep.into_iter();
    rects.retain(|_| flags.next().unwrap_or(true));
}

fn merge_same_line(rects: &mut Vec<Rect>, config: &OptimizerConfig) {
    let mut i = 0;
    while i < rects.len() {
        let mut j = i + 1;
        while j < rects.len() {
            if same_line(&rects[i], &rects[j], config) && adjacent(&rects[i], &rects[j], config) {
                rects[i] = rects[i].union(&rects[j]);
                rects.remove(j);
                // The union grew; earlier candidates may now touch it.
                j = i + 1;
            } else {
                j += 1;
            }
        }
        i += 1;
    }
}

fn same_line(a: &Rect, b: &Rect, config: &OptimizerConfig) -> bool {
    let overlap = a.bottom().min(b.bottom()) - a.top.max(b.top);
    overlap > 0.0 && overlap >= config.line_overlap_ratio * a.height.min(b.height)
}

fn adjacent(a: &Rect, b: &Rect, config: &OptimizerConfig) -> bool {
    // Negative gap means the boxes overlap horizontally.
    let gap = a.left.max(b.left) - a.right().min(b.right());
    gap <= config.adjacency_epsilon
}
