//! Time-axis reconciliation
//!
//! Nodes may return series on different time axes. Before fitting, every
//! surviving node of a feature is resampled onto one shared axis so that all
//! rows have the same length.

use std::sync::Arc;

use tracing::warn;

use crate::config::InterpolationMode;
use crate::error::FormatMismatch;
use crate::model::{FeatureValue, Interpolate, LinearInterpolant, NodeResult};

/// Per-node validity of one feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(Vec<bool>);

impl Mask {
    pub fn all_valid(len: usize) -> Self {
        Self(vec![true; len])
    }

    pub fn is_valid(&self, node: usize) -> bool {
        self.0[node]
    }

    pub fn invalidate(&mut self, node: usize) {
        self.0[node] = false;
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.0.iter().filter(|v| **v).count()
    }

    pub fn excluded_count(&self) -> usize {
        self.len() - self.valid_count()
    }

    pub fn all(&self) -> bool {
        self.0.iter().all(|v| *v)
    }
}

/// One feature across every surviving node, on a shared axis
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledFeature {
    pub name: String,
    pub time: Option<Vec<f64>>,
    pub shape: Vec<usize>,
    /// One flattened row per valid node, in node order
    pub rows: Vec<Vec<f64>>,
    pub mask: Mask,
}

impl ReconciledFeature {
    pub fn output_len(&self) -> usize {
        self.shape.iter().product()
    }
}

struct Candidate {
    time: Option<Vec<f64>>,
    value: FeatureValue,
    interpolant: Option<Arc<dyn Interpolate>>,
}

/// Reconcile feature `name` over every node result.
///
/// Returns `None` when no node has a usable value.
pub fn reconcile(
    name: &str,
    results: &[NodeResult],
    mode: InterpolationMode,
) -> Option<ReconciledFeature> {
    let mut mask = Mask::all_valid(results.len());
    let mut candidates: Vec<Option<Candidate>> = Vec::with_capacity(results.len());
    let mut timed: Option<bool> = None;
    // Shape without the time axis, set by the first node that passes the layout check
    let mut base_shape: Option<Vec<usize>> = None;

    for (node, result) in results.iter().enumerate() {
        let checked = result
            .get(name)
            .and_then(|output| output.value.clone().map(|value| (output, value)))
            .map(|(output, value)| {
                let candidate = Candidate {
                    time: output.time.clone(),
                    value,
                    interpolant: output.interpolant.clone(),
                };
                let has_time = candidate.time.is_some();
                let timed = *timed.get_or_insert(has_time);
                check_layout(name, node, candidate, timed).and_then(|candidate| {
                    let shape = base_shape_of(&candidate.value, timed);
                    let reference = base_shape.get_or_insert_with(|| shape.clone());
                    if *reference == shape {
                        Ok(candidate)
                    } else {
                        Err(FormatMismatch {
                            feature: name.to_string(),
                            node,
                            reason: format!(
                                "shape {:?} differs from the first node",
                                candidate.value.shape()
                            ),
                        })
                    }
                })
            });

        match checked {
            Some(Ok(candidate)) => candidates.push(Some(candidate)),
            Some(Err(mismatch)) => {
                warn!("{mismatch}");
                mask.invalidate(node);
                candidates.push(None);
            }
            None => {
                mask.invalidate(node);
                candidates.push(None);
            }
        }
    }

    let time = match timed {
        Some(true) => Some(shared_axis(&candidates, mode)),
        _ => None,
    };

    let mut shape: Option<Vec<usize>> = None;
    let mut rows = Vec::with_capacity(mask.valid_count());
    for (node, candidate) in candidates.into_iter().enumerate() {
        let Some(candidate) = candidate else {
            continue;
        };

        let value = match &time {
            Some(axis) if candidate.time.as_deref() != Some(axis.as_slice()) => {
                match candidate.interpolant {
                    Some(interpolant) => interpolant.interpolate(axis),
                    None => {
                        let own = candidate.time.unwrap_or_default();
                        match LinearInterpolant::new(own, candidate.value) {
                            Ok(interpolant) => interpolant.interpolate(axis),
                            Err(reason) => {
                                warn!(
                                    "{}",
                                    FormatMismatch {
                                        feature: name.to_string(),
                                        node,
                                        reason,
                                    }
                                );
                                mask.invalidate(node);
                                continue;
                            }
                        }
                    }
                }
            }
            _ => candidate.value,
        };

        let node_shape = value.shape();
        let reference = shape.get_or_insert_with(|| node_shape.clone());
        if *reference != node_shape {
            warn!(
                "{}",
                FormatMismatch {
                    feature: name.to_string(),
                    node,
                    reason: format!("shape {node_shape:?} differs from {reference:?}"),
                }
            );
            mask.invalidate(node);
            continue;
        }
        rows.push(value.flatten());
    }

    let shape = shape?;
    Some(ReconciledFeature {
        name: name.to_string(),
        time,
        shape,
        rows,
        mask,
    })
}

fn check_layout(
    name: &str,
    node: usize,
    candidate: Candidate,
    timed: bool,
) -> Result<Candidate, FormatMismatch> {
    let mismatch = |reason: String| FormatMismatch {
        feature: name.to_string(),
        node,
        reason,
    };

    if !candidate.value.is_rectangular() {
        return Err(mismatch("ragged matrix value".to_string()));
    }
    match (&candidate.time, timed) {
        (Some(_), false) => Err(mismatch("unexpected time axis".to_string())),
        (None, true) => Err(mismatch("missing time axis".to_string())),
        (Some(time), true) => {
            if time.is_empty() {
                return Err(mismatch("empty time axis".to_string()));
            }
            if time.iter().any(|t| !t.is_finite()) {
                return Err(mismatch("time axis has non-finite points".to_string()));
            }
            if time.windows(2).any(|w| w[0] >= w[1]) {
                return Err(mismatch("time axis is not strictly increasing".to_string()));
            }
            if candidate.interpolant.is_none() && candidate.value.last_axis_len() != Some(time.len())
            {
                return Err(mismatch(format!(
                    "time axis has {} points, value has shape {:?}",
                    time.len(),
                    candidate.value.shape()
                )));
            }
            Ok(candidate)
        }
        (None, false) => Ok(candidate),
    }
}

/// Shape a node must share with every other node; timed values may differ along the time axis
fn base_shape_of(value: &FeatureValue, timed: bool) -> Vec<usize> {
    let mut shape = value.shape();
    if timed {
        shape.pop();
    }
    shape
}

fn shared_axis(candidates: &[Option<Candidate>], mode: InterpolationMode) -> Vec<f64> {
    let axes = candidates
        .iter()
        .flatten()
        .filter_map(|c| c.time.as_ref());

    match mode {
        InterpolationMode::Union => {
            let mut union: Vec<f64> = axes.flatten().copied().collect();
            union.sort_by(f64::total_cmp);
            union.dedup();
            union
        }
        InterpolationMode::MaxLength => {
            let mut longest: Option<&Vec<f64>> = None;
            for axis in axes {
                if longest.is_none_or(|l| axis.len() > l.len()) {
                    longest = Some(axis);
                }
            }
            longest.cloned().unwrap_or_default()
        }
    }
}
