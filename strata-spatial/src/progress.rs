//! Progress reporting for long running index operations.

use parking_lot::Mutex;

/// Receives progress of a long running operation such as `add_all` or
/// `remove_all`.
pub trait ProgressListener: Send + Sync {
    /// Called once before any work, with the total number of units.
    fn begin(&self, units: u64);

    /// Called after each completed chunk of work.
    fn worked(&self, units: u64);

    /// Called once after the last unit, only when the operation succeeds.
    fn done(&self);
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl ProgressListener for NullListener {
    fn begin(&self, _units: u64) {}

    fn worked(&self, _units: u64) {}

    fn done(&self) {}
}

#[derive(Debug, Default)]
struct ProgressState {
    total: u64,
    completed: u64,
    last_logged_step: u64,
}

/// Logs progress through the `log` facade at every 10% step.
#[derive(Debug)]
pub struct ProgressLoggingListener {
    operation: String,
    state: Mutex<ProgressState>,
}

impl ProgressLoggingListener {
    pub fn new(operation: impl Into<String>) -> Self {
        ProgressLoggingListener {
            operation: operation.into(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Units reported so far.
    pub fn completed(&self) -> u64 {
        self.state.lock().completed
    }

    /// Total announced by `begin`.
    pub fn total(&self) -> u64 {
        self.state.lock().total
    }
}

impl ProgressListener for ProgressLoggingListener {
    fn begin(&self, units: u64) {
        let mut state = self.state.lock();
        *state = ProgressState {
            total: units,
            ..ProgressState::default()
        };
        log::info!("{}: starting, {} units of work", self.operation, units);
    }

    fn worked(&self, units: u64) {
        let mut state = self.state.lock();
        state.completed = state.completed.saturating_add(units);
        if state.total == 0 {
            return;
        }

        let step = (state.completed.min(state.total) * 10) / state.total;
        if step > state.last_logged_step {
            state.last_logged_step = step;
            log::info!(
                "{}: {}% ({}/{})",
                self.operation,
                step * 10,
                state.completed,
                state.total
            );
        }
    }

    fn done(&self) {
        let state = self.state.lock();
        log::info!("{}: done, {} units", self.operation, state.completed);
    }
}
