use crate::date::{self, ToCalendarDay};
use crate::db::KeyValueStore;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Storage key holding the serialized trip range.
pub const TRIP_KEY: &str = "tripDates";

/// The configured trip. `end` is never before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TripRange {
    /// Normalize both ends to calendar days and check ordering.
    pub fn new<S, E>(start: &S, end: &E) -> Result<Self, TripError>
    where
        S: ToCalendarDay + ?Sized,
        E: ToCalendarDay + ?Sized,
    {
        let start = date::start_of_day(start);
        let end = date::start_of_day(end);
        if date::diff_days(&end, &start) < 0 {
            return Err(TripError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for TripRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&date::format_range(&self.start, &self.end))
    }
}

/// Whether the container has been hydrated from storage yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    LoadedWithRange,
    LoadedWithoutRange,
}

impl LoadState {
    pub fn is_loaded(self) -> bool {
        self != LoadState::NotLoaded
    }
}

#[derive(Debug, Error)]
pub enum TripError {
    #[error("end date must be on or after start date (got {start} → {end})")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("failed to save trip: {0}")]
    Storage(#[source] anyhow::Error),
}

/// On-disk shape: two ISO 8601 strings under [`TRIP_KEY`].
#[derive(Debug, Serialize, Deserialize)]
struct StoredTrip {
    start: String,
    end: String,
}

impl StoredTrip {
    fn from_range(range: &TripRange) -> Self {
        Self {
            start: range.start.format("%Y-%m-%d").to_string(),
            end: range.end.format("%Y-%m-%d").to_string(),
        }
    }

    fn into_range(self) -> Option<TripRange> {
        let start = parse_stored_day(&self.start)?;
        let end = parse_stored_day(&self.end)?;
        TripRange::new(&start, &end).ok()
    }
}

/// Accepts plain dates and full RFC 3339 timestamps; the latter are
/// reduced to the local calendar day.
fn parse_stored_day(value: &str) -> Option<NaiveDate> {
    if let Ok(day) = date::parse_date(value) {
        return Some(day);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| date::start_of_day(&dt.with_timezone(&Local)))
}

type Listener = Box<dyn FnMut(Option<&TripRange>, LoadState)>;

/// Sole owner of the trip range. `set_trip` and `clear_trip` are the only
/// mutation paths; subscribers are told about every change.
pub struct TripState {
    store: Box<dyn KeyValueStore>,
    range: Option<TripRange>,
    loaded: bool,
    listeners: Vec<Listener>,
}

impl TripState {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            range: None,
            loaded: false,
            listeners: Vec::new(),
        }
    }

    pub fn range(&self) -> Option<&TripRange> {
        self.range.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        match (self.loaded, self.range.is_some()) {
            (false, _) => LoadState::NotLoaded,
            (true, true) => LoadState::LoadedWithRange,
            (true, false) => LoadState::LoadedWithoutRange,
        }
    }

    /// Register a callback invoked after hydration and every successful edit.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(Option<&TripRange>, LoadState) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Read the persisted range without touching in-memory state.
    ///
    /// Anything unreadable counts as "no trip configured".
    pub fn load(&self) -> Option<TripRange> {
        let raw = match self.store.get(TRIP_KEY) {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => return None,
            Err(err) => {
                warn!(error = %err, "Failed to read stored trip, treating as unset");
                return None;
            }
        };

        let stored: StoredTrip = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "Stored trip is malformed, treating as unset");
                return None;
            }
        };

        let range = stored.into_range();
        if range.is_none() {
            warn!("Stored trip has invalid dates, treating as unset");
        }
        range
    }

    /// Populate the container from storage and mark it loaded.
    pub fn hydrate(&mut self) -> LoadState {
        self.range = self.load();
        self.loaded = true;
        debug!(range = ?self.range, "Trip state hydrated");
        self.notify();
        self.load_state()
    }

    /// Replace the trip. Storage is written before memory, so a failed
    /// write leaves the previous range in place.
    pub fn set_trip<S, E>(&mut self, start: &S, end: &E) -> Result<(), TripError>
    where
        S: ToCalendarDay + ?Sized,
        E: ToCalendarDay + ?Sized,
    {
        let range = TripRange::new(start, end)?;

        let payload = serde_json::to_string(&StoredTrip::from_range(&range))
            .map_err(|err| TripError::Storage(err.into()))?;
        self.store
            .set(TRIP_KEY, &payload)
            .map_err(TripError::Storage)?;

        info!(start = %range.start, end = %range.end, "Trip saved");
        self.range = Some(range);
        self.loaded = true;
        self.notify();
        Ok(())
    }

    pub fn clear_trip(&mut self) -> Result<(), TripError> {
        self.store.remove(TRIP_KEY).map_err(TripError::Storage)?;

        info!("Trip cleared");
        self.range = None;
        self.loaded = true;
        self.notify();
        Ok(())
    }

    /// Monday to Friday of the week containing `today`.
    pub fn set_this_week<T: ToCalendarDay + ?Sized>(&mut self, today: &T) -> Result<(), TripError> {
        let monday = date::monday_of_week(today);
        let friday = date::friday_of_week(today);
        self.set_trip(&monday, &friday)
    }

    /// Monday to Friday of the week after the one containing `today`.
    pub fn set_next_week<T: ToCalendarDay + ?Sized>(&mut self, today: &T) -> Result<(), TripError> {
        let next = date::add_days(date::start_of_day(today), 7);
        let monday = date::monday_of_week(&next);
        let friday = date::friday_of_week(&next);
        self.set_trip(&monday, &friday)
    }

    fn notify(&mut self) {
        let state = self.load_state();
        let range = self.range;
        for listener in &mut self.listeners {
            listener(range.as_ref(), state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use anyhow::{Result, anyhow};
    use chrono::NaiveTime;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Shares one map across several `TripState`s to simulate restarts.
    #[derive(Clone, Default)]
    struct SharedStore {
        inner: Arc<Mutex<MemoryStore>>,
        fail_writes: Arc<Mutex<bool>>,
    }

    impl SharedStore {
        fn raw(&self) -> Option<String> {
            self.inner.lock().unwrap().get(TRIP_KEY).unwrap()
        }

        fn put_raw(&self, value: &str) {
            self.inner.lock().unwrap().set(TRIP_KEY, value).unwrap();
        }

        fn fail_writes(&self, fail: bool) {
            *self.fail_writes.lock().unwrap() = fail;
        }
    }

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.lock().unwrap().get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if *self.fail_writes.lock().unwrap() {
                return Err(anyhow!("disk full"));
            }
            self.inner.lock().unwrap().set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            if *self.fail_writes.lock().unwrap() {
                return Err(anyhow!("disk full"));
            }
            self.inner.lock().unwrap().remove(key)
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("storage unavailable"))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }

        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }
    }

    fn state_over(store: &SharedStore) -> TripState {
        let mut state = TripState::new(Box::new(store.clone()));
        state.hydrate();
        state
    }

    #[test]
    fn starts_not_loaded() {
        let state = TripState::new(Box::new(MemoryStore::new()));
        assert_eq!(state.load_state(), LoadState::NotLoaded);
        assert!(!state.load_state().is_loaded());
        assert_eq!(state.range(), None);
    }

    #[test]
    fn hydrate_empty_store() {
        let mut state = TripState::new(Box::new(MemoryStore::new()));
        assert_eq!(state.hydrate(), LoadState::LoadedWithoutRange);
        assert_eq!(state.range(), None);
    }

    #[test]
    fn set_then_reload_in_fresh_state() {
        let store = SharedStore::default();
        let mut state = state_over(&store);

        let start = date(2024, 6, 10).and_time(NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        let end = date(2024, 6, 14).and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        state.set_trip(&start, &end).unwrap();

        let fresh = state_over(&store);
        let range = fresh.range().copied().unwrap();
        assert_eq!(range.start(), date(2024, 6, 10));
        assert_eq!(range.end(), date(2024, 6, 14));
        assert_eq!(fresh.load_state(), LoadState::LoadedWithRange);
        assert_eq!(fresh.load(), Some(range));
    }

    #[test]
    fn stored_payload_is_iso_dates() {
        let store = SharedStore::default();
        let mut state = state_over(&store);
        state.set_trip(&date(2024, 6, 10), &date(2024, 6, 14)).unwrap();

        let value: serde_json::Value = serde_json::from_str(&store.raw().unwrap()).unwrap();
        assert_eq!(value["start"], "2024-06-10");
        assert_eq!(value["end"], "2024-06-14");
    }

    #[test]
    fn rejects_end_before_start() {
        let store = SharedStore::default();
        let mut state = state_over(&store);
        state.set_trip(&date(2024, 6, 10), &date(2024, 6, 14)).unwrap();
        let before = store.raw();

        let err = state
            .set_trip(&date(2024, 6, 14), &date(2024, 6, 13))
            .unwrap_err();

        assert!(matches!(err, TripError::InvalidRange { .. }));
        assert!(err.to_string().contains("end date must be on or after start date"));
        assert_eq!(state.range().map(|r| r.start()), Some(date(2024, 6, 10)));
        assert_eq!(store.raw(), before);
    }

    #[test]
    fn rejected_edit_never_reaches_storage() {
        let store = SharedStore::default();
        let mut state = state_over(&store);

        let err = state
            .set_trip(&date(2024, 6, 2), &date(2024, 6, 1))
            .unwrap_err();

        assert!(matches!(err, TripError::InvalidRange { .. }));
        assert_eq!(store.raw(), None);
        assert_eq!(state.load_state(), LoadState::LoadedWithoutRange);
    }

    #[test]
    fn single_day_trip_is_valid() {
        let mut state = TripState::new(Box::new(MemoryStore::new()));
        state.set_trip(&date(2024, 6, 10), &date(2024, 6, 10)).unwrap();
        assert_eq!(state.load_state(), LoadState::LoadedWithRange);
    }

    #[test]
    fn clear_then_reload_is_absent() {
        let store = SharedStore::default();
        let mut state = state_over(&store);
        state.set_trip(&date(2024, 6, 10), &date(2024, 6, 14)).unwrap();

        state.clear_trip().unwrap();

        assert_eq!(state.range(), None);
        assert_eq!(state.load(), None);
        assert_eq!(store.raw(), None);
        assert_eq!(state_over(&store).load_state(), LoadState::LoadedWithoutRange);
    }

    #[test]
    fn failed_write_keeps_previous_range() {
        let store = SharedStore::default();
        let mut state = state_over(&store);
        state.set_trip(&date(2024, 6, 10), &date(2024, 6, 14)).unwrap();
        store.fail_writes(true);

        let err = state
            .set_trip(&date(2024, 7, 1), &date(2024, 7, 5))
            .unwrap_err();
        assert!(matches!(err, TripError::Storage(_)));
        assert_eq!(state.range().map(|r| r.start()), Some(date(2024, 6, 10)));

        let err = state.clear_trip().unwrap_err();
        assert!(matches!(err, TripError::Storage(_)));
        assert!(state.range().is_some());

        store.fail_writes(false);
        assert_eq!(state_over(&store).range().map(|r| r.start()), Some(date(2024, 6, 10)));
    }

    #[test]
    fn unreadable_store_loads_as_unset() {
        let mut state = TripState::new(Box::new(BrokenStore));
        assert_eq!(state.hydrate(), LoadState::LoadedWithoutRange);
        assert!(matches!(
            state.set_trip(&date(2024, 6, 10), &date(2024, 6, 14)),
            Err(TripError::Storage(_))
        ));
    }

    #[test]
    fn malformed_payloads_load_as_unset() {
        let cases = [
            "",
            "   ",
            "not json",
            "null",
            "{}",
            r#"{"start":"2024-06-10"}"#,
            r#"{"start":"2024-06-10","end":"someday"}"#,
            r#"{"start":"2024-06-14","end":"2024-06-10"}"#,
            r#"{"start":10,"end":14}"#,
        ];

        for raw in cases {
            let store = SharedStore::default();
            store.put_raw(raw);
            let state = state_over(&store);
            assert_eq!(state.range(), None, "payload {raw:?}");
            assert_eq!(state.load_state(), LoadState::LoadedWithoutRange);
        }
    }

    #[test]
    fn accepts_timestamp_payloads() {
        let store = SharedStore::default();
        let start = date(2024, 6, 10).and_hms_opt(12, 0, 0).unwrap();
        let end = date(2024, 6, 14).and_hms_opt(12, 0, 0).unwrap();
        let start = start.and_local_timezone(Local).single().unwrap().to_rfc3339();
        let end = end.and_local_timezone(Local).single().unwrap().to_rfc3339();
        store.put_raw(&format!(r#"{{"start":"{start}","end":"{end}"}}"#));

        let range = state_over(&store).range().copied().unwrap();
        assert_eq!(range.start(), date(2024, 6, 10));
        assert_eq!(range.end(), date(2024, 6, 14));
    }

    #[test]
    fn quick_selections() {
        let mut state = TripState::new(Box::new(MemoryStore::new()));
        // Wednesday
        let today = date(2024, 6, 12);

        state.set_this_week(&today).unwrap();
        let range = state.range().copied().unwrap();
        assert_eq!((range.start(), range.end()), (date(2024, 6, 10), date(2024, 6, 14)));

        state.set_next_week(&today).unwrap();
        let range = state.range().copied().unwrap();
        assert_eq!((range.start(), range.end()), (date(2024, 6, 17), date(2024, 6, 21)));
    }

    #[test]
    fn quick_selection_on_sunday_uses_current_week() {
        let mut state = TripState::new(Box::new(MemoryStore::new()));
        state.set_this_week(&date(2024, 6, 16)).unwrap();
        assert_eq!(state.range().map(|r| r.start()), Some(date(2024, 6, 10)));
    }

    #[test]
    fn listeners_see_every_change() {
        let seen: Rc<RefCell<Vec<(Option<NaiveDate>, LoadState)>>> = Rc::default();
        let sink = Rc::clone(&seen);

        let mut state = TripState::new(Box::new(MemoryStore::new()));
        state.subscribe(move |range, load| {
            sink.borrow_mut().push((range.map(|r| r.start()), load));
        });

        state.hydrate();
        state.set_trip(&date(2024, 6, 10), &date(2024, 6, 14)).unwrap();
        let _ = state.set_trip(&date(2024, 6, 14), &date(2024, 6, 10));
        state.clear_trip().unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (None, LoadState::LoadedWithoutRange),
                (Some(date(2024, 6, 10)), LoadState::LoadedWithRange),
                (None, LoadState::LoadedWithoutRange),
            ]
        );
    }

    #[test]
    fn display_uses_short_range() {
        let range = TripRange::new(&date(2024, 6, 10), &date(2024, 6, 14)).unwrap();
        assert_eq!(range.to_string(), "Mon, Jun 10 \u{2192} Fri, Jun 14");
    }
}
