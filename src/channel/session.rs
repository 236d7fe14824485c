use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::api::{ControllerApi, WsToken};
use crate::error::AppResult;

/// Owns token acquisition for the live channel. At most one acquisition
/// is in flight at a time; a second caller backs off empty-handed
/// instead of racing the first.
#[derive(Debug, Default)]
pub struct SessionManager {
    acquiring: AtomicBool,
}

impl SessionManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            acquiring: AtomicBool::new(false),
        }
    }

    /// Fetches a fresh connection token, or `Ok(None)` when another
    /// acquisition is already running.
    ///
    /// # Errors
    ///
    /// Returns the api error when the token request fails; the caller
    /// schedules the retry.
    pub async fn acquire_token<TApi>(&self, api: &TApi) -> AppResult<Option<WsToken>>
    where
        TApi: ControllerApi + Sync,
    {
        if self
            .acquiring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Token acquisition already in flight, skipping");
            return Ok(None);
        }
        let result = api.ws_token().await;
        self.acquiring.store(false, Ordering::Release);
        result.map(Some)
    }

    #[must_use]
    pub fn is_acquiring(&self) -> bool {
        self.acquiring.load(Ordering::Acquire)
    }
}
