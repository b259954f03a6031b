//! Per-run evaluation state.

use crate::data::PlnData;

/// Read-only data of one optimization call plus its evaluation counter.
///
/// The evaluator is the only writer of the counter; it is incremented once
/// per objective query, with or without gradient.
#[derive(Debug)]
pub struct EvaluationContext<'a> {
    data: &'a PlnData,
    evaluation_count: usize,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(data: &'a PlnData) -> Self {
        Self {
            data,
            evaluation_count: 0,
        }
    }

    pub fn data(&self) -> &'a PlnData {
        self.data
    }

    /// Number of objective queries so far.
    pub fn evaluation_count(&self) -> usize {
        self.evaluation_count
    }

    pub(crate) fn record_evaluation(&mut self) {
        self.evaluation_count += 1;
    }
}
