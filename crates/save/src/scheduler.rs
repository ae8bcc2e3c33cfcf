// ---------------------------------------------------------------------------
// scheduler – Injectable clock, backup boundary evaluation, and the
// background tick runner
// ---------------------------------------------------------------------------
//
// Boundary detection is pure: `BackupSchedule::evaluate` takes a timestamp
// and says which backup types are due, so daily/weekly logic is testable
// without wall-clock waits. The thread in `SchedulerHandle` only ticks and
// delegates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::backup::BackupType;

/// Time source abstraction so scheduling is deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-cranked clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

/// The Sunday that starts the week containing `date`. Weekly backups are
/// anchored to Sunday, so two dates sharing this anchor are in the same
/// backup week.
fn week_anchor(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Due-backup evaluation state. Each boundary crossing yields at most one
/// backup of its type: days or weeks missed while the process was down
/// produce exactly one catch-up, not one per missed period.
#[derive(Debug, Clone)]
pub struct BackupSchedule {
    auto_interval: Duration,
    last_auto: Option<DateTime<Utc>>,
    last_daily: Option<NaiveDate>,
    last_weekly_anchor: Option<NaiveDate>,
}

impl BackupSchedule {
    pub fn new(auto_interval: Duration) -> Self {
        Self {
            auto_interval,
            last_auto: None,
            last_daily: None,
            last_weekly_anchor: None,
        }
    }

    /// Seed the daily/weekly anchors from existing backup history so a
    /// restart does not immediately re-trigger boundary backups.
    pub fn seed(
        &mut self,
        last_auto: Option<DateTime<Utc>>,
        last_daily: Option<DateTime<Utc>>,
        last_weekly: Option<DateTime<Utc>>,
    ) {
        self.last_auto = last_auto;
        self.last_daily = last_daily.map(|t| t.date_naive());
        self.last_weekly_anchor = last_weekly.map(|t| week_anchor(t.date_naive()));
    }

    /// Which backup types are due at `now`. Marks them as taken.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Vec<BackupType> {
        let mut due = Vec::new();

        let auto_due = match self.last_auto {
            Some(last) => now - last >= self.auto_interval,
            None => true,
        };
        if auto_due {
            self.last_auto = Some(now);
            due.push(BackupType::Auto);
        }

        let today = now.date_naive();
        if self.last_daily != Some(today) {
            // Calendar-date comparison, not elapsed seconds: a save at
            // 23:59 and one at 00:01 are on different days.
            if self.last_daily.is_some() {
                due.push(BackupType::Daily);
            }
            self.last_daily = Some(today);
        }

        let anchor = week_anchor(today);
        if self.last_weekly_anchor != Some(anchor) {
            if self.last_weekly_anchor.is_some() {
                due.push(BackupType::Weekly);
            }
            self.last_weekly_anchor = Some(anchor);
        }

        due
    }
}

/// Handle to the background scheduler thread. Dropping without `stop()`
/// detaches the thread; it exits on the next tick after the flag is set.
pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Spawn a thread that invokes `tick` every `tick_interval` until
    /// stopped. The first tick happens immediately.
    pub fn spawn<F>(tick_interval: StdDuration, tick: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("backup-scheduler".to_string())
            .spawn(move || {
                debug!("backup scheduler started");
                while !stop_flag.load(Ordering::Relaxed) {
                    tick();
                    // Sleep in short slices so stop() is responsive.
                    let mut remaining = tick_interval;
                    let slice = StdDuration::from_millis(50);
                    while remaining > StdDuration::ZERO && !stop_flag.load(Ordering::Relaxed) {
                        let step = remaining.min(slice);
                        thread::sleep(step);
                        remaining = remaining.saturating_sub(step);
                    }
                }
                debug!("backup scheduler stopped");
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to spawn backup scheduler thread");
                None
            }
        };

        Self { stop, thread }
    }

    /// Signal the thread to exit and wait for it.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
