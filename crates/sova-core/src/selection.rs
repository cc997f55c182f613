//! Object selections used to scope an export

use std::str::FromStr;

use thiserror::Error;

/// A sorted set of 0-based object indices
///
/// Held as sorted, disjoint, non-adjacent inclusive ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ranges: Vec<(usize, usize)>,
}

/// Error returned when a range list cannot be parsed
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid selection '{input}': {reason}")]
pub struct SelectionParseError {
    input: String,
    reason: String,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one index, returning whether it was new
    pub fn insert(&mut self, index: usize) -> bool {
        if self.contains(index) {
            return false;
        }
        self.insert_range(index, index);
        true
    }

    /// Add every index in `start..=end`
    pub fn insert_range(&mut self, start: usize, end: usize) {
        self.ranges.push((start.min(end), start.max(end)));
        self.ranges = merge(std::mem::take(&mut self.ranges));
    }

    pub fn contains(&self, index: usize) -> bool {
        let i = self.ranges.partition_point(|&(_, end)| end < index);
        self.ranges.get(i).is_some_and(|&(start, _)| start <= index)
    }

    /// Number of selected indices, saturating at `usize::MAX`
    pub fn len(&self) -> usize {
        self.ranges.iter().fold(0usize, |total, &(start, end)| {
            total.saturating_add((end - start).saturating_add(1))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|&(start, end)| start..=end)
    }
}

/// Sort ranges and fuse overlapping or touching ones
fn merge(mut ranges: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    ranges.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

impl FromIterator<usize> for Selection {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            ranges: merge(iter.into_iter().map(|i| (i, i)).collect()),
        }
    }
}

impl FromStr for Selection {
    type Err = SelectionParseError;

    /// Parse a range list such as `0-3,7,9`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| SelectionParseError {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let mut ranges = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((start, end)) => {
                    let start: usize = start.trim().parse().map_err(|_| fail("bad range start"))?;
                    let end: usize = end.trim().parse().map_err(|_| fail("bad range end"))?;
                    if end < start {
                        return Err(fail("range end precedes start"));
                    }
                    ranges.push((start, end));
                }
                None => {
                    let index: usize = part.parse().map_err(|_| fail("not an index"))?;
                    ranges.push((index, index));
                }
            }
        }
        Ok(Selection {
            ranges: merge(ranges),
        })
    }
}
