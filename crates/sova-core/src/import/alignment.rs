//! Positional pairing of data rows with per-subspace scores
//!
//! The companion file lists scores per subspace in object order; the
//! data file lists objects in the same order. Row `r` of the data file
//! takes the `r`-th score of every subspace queue.

use std::collections::VecDeque;

use thiserror::Error;

/// Alignment failures between the two streams
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("score refers to subspace {index}, but only {count} subspaces are declared")]
    UnknownSubspace { index: usize, count: usize },

    #[error("no score left for subspace {subspace}; the companion file has fewer scores than data rows")]
    Underflow { subspace: usize },

    #[error("{remaining} unused scores for subspace {subspace}; the companion file has more scores than data rows")]
    Overflow { subspace: usize, remaining: usize },
}

/// One FIFO score queue per declared subspace
#[derive(Debug, Clone, Default)]
pub struct ScoreQueues {
    queues: Vec<VecDeque<f64>>,
}

impl ScoreQueues {
    pub fn new(subspaces: usize) -> Self {
        Self {
            queues: vec![VecDeque::new(); subspaces],
        }
    }

    /// Number of subspace queues
    pub fn subspace_count(&self) -> usize {
        self.queues.len()
    }

    /// Pending scores for one subspace
    pub fn pending(&self, subspace: usize) -> usize {
        self.queues.get(subspace).map_or(0, VecDeque::len)
    }

    /// Pending scores across all subspaces
    pub fn total_pending(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Queue a score, preserving arrival order
    pub fn push(&mut self, subspace: usize, score: f64) -> Result<(), AlignmentError> {
        let count = self.queues.len();
        let queue = self
            .queues
            .get_mut(subspace)
            .ok_or(AlignmentError::UnknownSubspace {
                index: subspace,
                count,
            })?;
        queue.push_back(score);
        Ok(())
    }

    /// Append the next score of every subspace, in declaration order
    ///
    /// Leaves `row` untouched if any queue is exhausted.
    pub fn append_row(&mut self, row: &mut Vec<f64>) -> Result<(), AlignmentError> {
        if let Some(subspace) = self.queues.iter().position(VecDeque::is_empty) {
            return Err(AlignmentError::Underflow { subspace });
        }

        row.extend(self.queues.iter_mut().filter_map(VecDeque::pop_front));
        Ok(())
    }

    /// Check that every score was consumed
    pub fn finish(&self) -> Result<(), AlignmentError> {
        match self.queues.iter().position(|q| !q.is_empty()) {
            Some(subspace) => Err(AlignmentError::Overflow {
                subspace,
                remaining: self.queues[subspace].len(),
            }),
            None => Ok(()),
        }
    }
}
