use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{BalloonError, Result};

/// Upper bound on how many balloons may be rendered into one transcript.
pub const MAX_SELECTION: usize = 10;

/// Set of chosen position indices, iterated in ascending order.
///
/// Stored as disjoint inclusive ranges keyed by their start, so a wide range
/// such as `0-4000000000` costs one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ranges: BTreeMap<usize, usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self> {
        input.parse()
    }

    pub fn insert(&mut self, index: usize) -> bool {
        if self.contains(index) {
            return false;
        }
        self.insert_range(index, index);
        true
    }

    /// Adds every index in `start..=end`, merging with overlapping or
    /// adjacent ranges already selected.
    pub fn insert_range(&mut self, start: usize, end: usize) {
        if start > end {
            return;
        }

        let mut start = start;
        let mut end = end;

        if let Some((&prev_start, &prev_end)) = self.ranges.range(..=start).next_back()
            && prev_end.saturating_add(1) >= start
        {
            start = prev_start;
            end = end.max(prev_end);
        }

        let absorbed = self
            .ranges
            .range(start..)
            .take_while(|(next_start, _)| **next_start <= end.saturating_add(1))
            .map(|(next_start, next_end)| (*next_start, *next_end))
            .collect::<Vec<_>>();
        for (next_start, next_end) in absorbed {
            self.ranges.remove(&next_start);
            end = end.max(next_end);
        }

        self.ranges.insert(start, end);
    }

    pub fn remove(&mut self, index: usize) -> bool {
        let Some((&start, &end)) = self.ranges.range(..=index).next_back() else {
            return false;
        };
        if end < index {
            return false;
        }

        self.ranges.remove(&start);
        if start < index {
            self.ranges.insert(start, index - 1);
        }
        if index < end {
            self.ranges.insert(index + 1, end);
        }
        true
    }

    /// Flips membership of `index`, returning whether it is now selected.
    pub fn toggle(&mut self, index: usize) -> bool {
        if self.remove(index) {
            false
        } else {
            self.insert_range(index, index);
            true
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.ranges
            .range(..=index)
            .next_back()
            .is_some_and(|(_, end)| *end >= index)
    }

    /// Number of selected indices, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        self.ranges.iter().fold(0usize, |total, (start, end)| {
            total.saturating_add((end - start).saturating_add(1))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn exceeds_limit(&self) -> bool {
        self.len() > MAX_SELECTION
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|(start, end)| *start..=*end)
    }
}

impl FromIterator<usize> for Selection {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut selection = Self::new();
        for index in iter {
            selection.insert_range(index, index);
        }
        selection
    }
}

/// Accepts a comma-separated list of indices and inclusive ranges, such as
/// `0,3,5-7`.
impl FromStr for Selection {
    type Err = BalloonError;

    fn from_str(input: &str) -> Result<Self> {
        let mut selection = Self::new();

        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(BalloonError::InvalidSelection(input.to_string()));
            }

            match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_index(start, input)?;
                    let end = parse_index(end, input)?;
                    if start > end {
                        return Err(BalloonError::InvalidSelection(input.to_string()));
                    }
                    selection.insert_range(start, end);
                }
                None => {
                    let index = parse_index(part, input)?;
                    selection.insert_range(index, index);
                }
            }
        }

        Ok(selection)
    }
}

fn parse_index(value: &str, input: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| BalloonError::InvalidSelection(input.to_string()))
}
