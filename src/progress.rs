//! Progress reporting for the `generate` pass.
//!
//! A [`Progress`] is stored per build session, so independent builds never
//! share reporting state.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Long-running phases of atlas generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressPhase {
    ComputeCharts,
    ParameterizeCharts,
    PackCharts,
    BuildOutputMeshes,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressPhase::ComputeCharts => "ComputeCharts",
            ProgressPhase::ParameterizeCharts => "ParameterizeCharts",
            ProgressPhase::PackCharts => "PackCharts",
            ProgressPhase::BuildOutputMeshes => "BuildOutputMeshes",
        }
    }
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Callback = dyn Fn(ProgressPhase, u32) -> bool + Send + Sync;

/// Progress callback invoked with a phase and a percentage in `0..=100`.
///
/// Returning `false` requests cancellation. Generation does not support
/// cancellation, so the request is logged once and otherwise ignored.
pub struct Progress {
    callback: Box<Callback>,
    cancel_requested: AtomicBool,
}

impl Progress {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(ProgressPhase, u32) -> bool + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _| true)
    }

    /// Report `percent` (clamped to 100) for `phase`.
    pub fn report(&self, phase: ProgressPhase, percent: u32) {
        let keep_going = (self.callback)(phase, percent.min(100));
        if !keep_going && !self.cancel_requested.swap(true, Ordering::Relaxed) {
            debug!(%phase, "Cancellation requested by progress callback; ignored");
        }
    }

    /// Report `done` out of `total` steps of `phase`.
    pub fn report_steps(&self, phase: ProgressPhase, done: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total) * 100 / total) as u32
        };
        self.report(phase, percent);
    }

    /// Whether the callback ever asked to cancel.
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Relaxed)
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("cancel_requested", &self.cancel_requested())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn report_steps_computes_percent() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |phase, pct| {
            sink.lock().unwrap().push((phase, pct));
            true
        });

        progress.report_steps(ProgressPhase::PackCharts, 0, 4);
        progress.report_steps(ProgressPhase::PackCharts, 1, 4);
        progress.report_steps(ProgressPhase::PackCharts, 4, 4);
        progress.report_steps(ProgressPhase::ComputeCharts, 0, 0);
        progress.report(ProgressPhase::ParameterizeCharts, 250);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (ProgressPhase::PackCharts, 0),
                (ProgressPhase::PackCharts, 25),
                (ProgressPhase::PackCharts, 100),
                (ProgressPhase::ComputeCharts, 100),
                (ProgressPhase::ParameterizeCharts, 100),
            ]
        );
        assert!(!progress.cancel_requested());
    }

    #[test]
    fn cancel_request_is_recorded() {
        let progress = Progress::new(|_, _| false);
        progress.report(ProgressPhase::ComputeCharts, 10);
        assert!(progress.cancel_requested());
    }

    #[test]
    fn phase_display() {
        assert_eq!(ProgressPhase::ComputeCharts.to_string(), "ComputeCharts");
        assert_eq!(ProgressPhase::BuildOutputMeshes.to_string(), "BuildOutputMeshes");
    }
}
