use crate::config::WatchConfig;
use crate::date;
use crate::status::{self, ResolvedStatus};
use crate::trip::{TripRange, TripState};
use chrono::NaiveDate;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Re-resolves the trip status whenever the day rolls over or the stored
/// range changes underneath us.
pub struct StatusWatcher {
    config: WatchConfig,
    trip: TripState,
    running: Arc<AtomicBool>,
    last: Option<(NaiveDate, Option<TripRange>)>,
}

impl StatusWatcher {
    pub fn new(config: WatchConfig, trip: TripState, running: Arc<AtomicBool>) -> Self {
        Self {
            config,
            trip,
            running,
            last: None,
        }
    }

    /// Run the watch loop. Blocks until the shutdown signal fires.
    pub fn run(mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.check_once(date::today());
            self.sleep();
        }

        info!("Status watcher shutting down");
    }

    /// Returns the new status if anything changed since the last check.
    fn check_once(&mut self, today: NaiveDate) -> Option<ResolvedStatus> {
        let range = self.trip.load();
        let key = (today, range);

        if self.last == Some(key) {
            debug!(%today, "Trip status unchanged");
            return None;
        }
        self.last = Some(key);

        let status = status::resolve(&today, range.as_ref());
        info!(
            %today,
            category = ?status.category,
            tier = %status.visual_key,
            secondary = %status.secondary_text,
            tertiary = status.tertiary_text.as_deref().unwrap_or(""),
            "{}",
            status.primary_text
        );
        Some(status)
    }

    fn sleep(&self) {
        let mut slept = 0;
        while slept < self.config.check_interval_seconds && self.running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_secs(1));
            slept += 1;
        }
    }
}
