//! Waiting for the updater

/// What [`crate::Navigator::wait`] blocks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitConditionType {
    /// Jobs for tiles near the player are done
    RequiredTilesPresent,
    AllJobsDone,
}

/// Progress sink for long waits, e.g. a loading screen
pub trait LoadingListener {
    fn set_label(&mut self, _label: &str) {}

    fn set_progress_range(&mut self, _range: usize) {}

    fn set_progress(&mut self, _value: usize) {}

    /// Returning false stops the wait early
    fn keep_waiting(&mut self) -> bool {
        true
    }
}

/// Listener that logs progress at debug level
#[derive(Debug, Default)]
pub struct LogLoadingListener {
    range: usize,
}

impl LoadingListener for LogLoadingListener {
    fn set_label(&mut self, label: &str) {
        log::debug!("{label}");
    }

    fn set_progress_range(&mut self, range: usize) {
        self.range = range;
    }

    fn set_progress(&mut self, value: usize) {
        log::debug!("Navmesh jobs: {value}/{}", self.range);
    }
}
