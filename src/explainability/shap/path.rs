//! Path bookkeeping for path-dependent TreeSHAP.
//!
//! While descending a tree, TreeSHAP tracks the set of unique features seen on
//! the current path together with, for every subset size, the proportion of
//! feature subsets that would lead to the current node. Each recursion level
//! owns a contiguous segment of one arena and copies its parent's segment
//! before extending it, so no allocation happens during the walk.

/// One unique feature on the current root-to-node path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathElement {
    /// Split feature, `None` for the root placeholder.
    pub feature: Option<usize>,
    /// Fraction of training cover that flows down this path when the feature
    /// is absent from the coalition.
    pub zero_fraction: f64,
    /// 1 if the explained row follows this path when the feature is present,
    /// 0 otherwise.
    pub one_fraction: f64,
    /// Permutation weight of subsets of this size.
    pub pweight: f64,
}

impl Default for PathElement {
    fn default() -> Self {
        Self { feature: None, zero_fraction: 0.0, one_fraction: 0.0, pweight: 0.0 }
    }
}

/// Arena of path segments, reusable across trees and rows.
#[derive(Clone, Debug, Default)]
pub struct PathState {
    elements: Vec<PathElement>,
}

impl PathState {
    /// Arena for trees up to `depth` nodes deep.
    pub fn with_depth(depth: usize) -> Self {
        let mut state = Self::default();
        state.reserve_depth(depth);
        state
    }

    /// Grow the arena so trees up to `depth` nodes deep fit.
    pub fn reserve_depth(&mut self, depth: usize) {
        let needed = (depth + 2) * (depth + 3) / 2;
        if self.elements.len() < needed {
            self.elements.resize(needed, PathElement::default());
        }
    }

    /// Copy `len` elements of the parent segment to the start of a new segment.
    #[inline]
    pub fn copy_parent(&mut self, parent_start: usize, start: usize, len: usize) {
        self.elements.copy_within(parent_start..parent_start + len, start);
    }

    /// Segment `[start, start + unique_depth]` (inclusive).
    #[inline]
    pub fn segment(&self, start: usize, unique_depth: usize) -> &[PathElement] {
        &self.elements[start..=start + unique_depth]
    }

    #[inline]
    fn segment_mut(&mut self, start: usize, unique_depth: usize) -> &mut [PathElement] {
        &mut self.elements[start..=start + unique_depth]
    }

    /// Append a feature at position `unique_depth` and update the permutation
    /// weights of all shorter subsets.
    pub fn extend(
        &mut self,
        start: usize,
        unique_depth: usize,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let path = self.segment_mut(start, unique_depth);
        let ud = unique_depth;
        path[ud] = PathElement {
            feature,
            zero_fraction,
            one_fraction,
            pweight: if ud == 0 { 1.0 } else { 0.0 },
        };
        let denom = (ud + 1) as f64;
        for i in (0..ud).rev() {
            path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
            path[i].pweight = zero_fraction * path[i].pweight * (ud - i) as f64 / denom;
        }
    }

    /// Remove the element at `path_index`, undoing its [`extend`](Self::extend).
    ///
    /// The segment shrinks to `unique_depth - 1`.
    pub fn unwind(&mut self, start: usize, unique_depth: usize, path_index: usize) {
        let path = self.segment_mut(start, unique_depth);
        let ud = unique_depth;
        let PathElement { zero_fraction, one_fraction, .. } = path[path_index];
        let denom = (ud + 1) as f64;

        let mut next = path[ud].pweight;
        for i in (0..ud).rev() {
            if one_fraction != 0.0 {
                let tmp = path[i].pweight;
                path[i].pweight = next * denom / ((i + 1) as f64 * one_fraction);
                next = tmp - path[i].pweight * zero_fraction * (ud - i) as f64 / denom;
            } else {
                path[i].pweight = path[i].pweight * denom / (zero_fraction * (ud - i) as f64);
            }
        }

        for i in path_index..ud {
            path[i].feature = path[i + 1].feature;
            path[i].zero_fraction = path[i + 1].zero_fraction;
            path[i].one_fraction = path[i + 1].one_fraction;
        }
    }

    /// Total permutation weight of the path with `path_index` removed,
    /// without modifying the arena.
    pub fn unwound_sum(&self, start: usize, unique_depth: usize, path_index: usize) -> f64 {
        let path = self.segment(start, unique_depth);
        let ud = unique_depth;
        let PathElement { zero_fraction, one_fraction, .. } = path[path_index];
        let denom = (ud + 1) as f64;

        let mut total = 0.0;
        let mut next = path[ud].pweight;
        for i in (0..ud).rev() {
            if one_fraction != 0.0 {
                let tmp = next * denom / ((i + 1) as f64 * one_fraction);
                total += tmp;
                next = path[i].pweight - tmp * zero_fraction * (ud - i) as f64 / denom;
            } else if zero_fraction != 0.0 {
                total += (path[i].pweight / zero_fraction) / ((ud - i) as f64 / denom);
            }
        }
        total
    }

    /// Position of `feature` in the segment, if present.
    pub fn find(&self, start: usize, unique_depth: usize, feature: usize) -> Option<usize> {
        self.segment(start, unique_depth)
            .iter()
            .position(|e| e.feature == Some(feature))
    }
}
