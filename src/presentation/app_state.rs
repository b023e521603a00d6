// Application state for HTTP handlers
use crate::application::mobility_screen::ScreenHandle;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub screen: ScreenHandle,
    /// How long a range change may take before the current snapshot is returned.
    pub settle_timeout: Duration,
}

impl AppState {
    pub fn new(screen: ScreenHandle) -> Self {
        Self {
            screen,
            settle_timeout: Duration::from_secs(5),
        }
    }
}
