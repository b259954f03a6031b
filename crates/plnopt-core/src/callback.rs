//! Callback support for optimization algorithms.
//!
//! This module provides traits and types for implementing callbacks that can
//! monitor and control the optimization process.

use crate::{error::Result, optimizer::OptimizationResult, types::Vector};
use std::time::Duration;

/// Information passed to callbacks after each accepted iterate.
#[derive(Clone, Debug)]
pub struct IterationInfo<'a> {
    /// Accepted iterate number, starting at 1
    pub iteration: usize,

    /// Objective value at the accepted point
    pub value: f64,

    /// The accepted point
    pub point: &'a Vector,

    /// Objective evaluations so far
    pub evaluations: usize,

    /// Elapsed time since optimization start
    pub elapsed: Duration,
}

/// Trait for optimization callbacks.
///
/// Callbacks allow monitoring and controlling the optimization process.
/// They can be used for logging, recording a trajectory or early stopping.
pub trait OptimizationCallback {
    /// Called at the start of optimization.
    fn on_optimization_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called at the end of each iteration.
    ///
    /// Returns `true` to continue optimization, `false` to stop early.
    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> Result<bool> {
        let _ = info;
        Ok(true)
    }

    /// Called at the end of optimization.
    fn on_optimization_end(&mut self, result: &OptimizationResult) -> Result<()> {
        let _ = result;
        Ok(())
    }
}

/// A no-op callback that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCallback;

impl OptimizationCallback for NoOpCallback {}

/// A callback that reports progress through the `log` facade.
#[derive(Debug, Clone)]
pub struct LogProgressCallback {
    log_every: usize,
}

impl LogProgressCallback {
    /// Create a callback logging every `log_every` iterations (at least 1).
    pub fn new(log_every: usize) -> Self {
        Self {
            log_every: log_every.max(1),
        }
    }
}

impl OptimizationCallback for LogProgressCallback {
    fn on_optimization_start(&mut self) -> Result<()> {
        log::info!("Starting optimization");
        Ok(())
    }

    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> Result<bool> {
        if info.iteration % self.log_every == 0 {
            log::info!(
                "Iteration {}: objective = {:.10e}, evaluations = {}",
                info.iteration,
                info.value,
                info.evaluations
            );
        }
        Ok(true)
    }

    fn on_optimization_end(&mut self, result: &OptimizationResult) -> Result<()> {
        log::info!(
            "Optimization finished after {} iterations: {} (objective = {:.10e})",
            result.iterations,
            result.termination_reason,
            result.value
        );
        Ok(())
    }
}

/// A callback recording the objective value of every accepted iterate.
///
/// Optionally stops the run after a fixed number of iterations.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    /// Objective values in acceptance order
    pub values: Vec<f64>,
    stop_after: Option<usize>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop once `iterations` iterates have been accepted.
    pub fn with_stop_after(mut self, iterations: usize) -> Self {
        self.stop_after = Some(iterations);
        self
    }

    /// True if the recorded values never increase.
    pub fn is_monotone(&self) -> bool {
        self.values.windows(2).all(|w| w[1] <= w[0])
    }
}

impl OptimizationCallback for HistoryCallback {
    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> Result<bool> {
        self.values.push(info.value);
        Ok(self.stop_after.map_or(true, |limit| self.values.len() < limit))
    }
}

impl<C: OptimizationCallback + ?Sized> OptimizationCallback for &mut C {
    fn on_optimization_start(&mut self) -> Result<()> {
        (**self).on_optimization_start()
    }

    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> Result<bool> {
        (**self).on_iteration_end(info)
    }

    fn on_optimization_end(&mut self, result: &OptimizationResult) -> Result<()> {
        (**self).on_optimization_end(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(iteration: usize, value: f64, point: &Vector) -> IterationInfo<'_> {
        IterationInfo {
            iteration,
            value,
            point,
            evaluations: iteration + 1,
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_history_callback() {
        let point = Vector::zeros(2);
        let mut callback = HistoryCallback::new().with_stop_after(3);

        assert!(callback.on_iteration_end(&info(1, 3.0, &point)).unwrap());
        assert!(callback.on_iteration_end(&info(2, 2.0, &point)).unwrap());
        assert!(!callback.on_iteration_end(&info(3, 2.0, &point)).unwrap());
        assert_eq!(callback.values, vec![3.0, 2.0, 2.0]);
        assert!(callback.is_monotone());

        callback.values.push(2.5);
        assert!(!callback.is_monotone());
    }

    #[test]
    fn test_noop_and_log_callbacks_continue() {
        let point = Vector::zeros(1);
        assert!(NoOpCallback.on_iteration_end(&info(1, 0.0, &point)).unwrap());

        let mut logger = LogProgressCallback::new(0);
        assert!(logger.on_optimization_start().is_ok());
        assert!(logger.on_iteration_end(&info(7, 1.0, &point)).unwrap());
    }
}
