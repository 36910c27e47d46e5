//! Timer bookkeeping and the background ticker.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use lumi_common::{Error, IdGenerator, Result};
use lumi_engine::query::parse_query;
use parking_lot::Mutex;

use crate::DbHandle;

/// Seconds since the manager started; the scheduler's clock unit.
type Tick = i64;

const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// User-visible description of one timer.
#[derive(Debug, Clone)]
pub struct TimerDesc {
    /// Timer id (monotonic decimal).
    pub id: String,
    /// Interval as given, e.g. `10s`.
    pub interval: String,
    /// Pipeline run on each firing.
    pub query: String,
}

struct Task {
    run: Box<dyn Fn() + Send + Sync>,
    interval: Tick,
    cancelled: AtomicBool,
}

struct ScheduledTask {
    deadline: Tick,
    task: Arc<Task>,
}

// Reverse ordering so the earliest deadline sits on top of the max-heap.
impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Eq for ScheduledTask {}

/// Deadline min-heap with lazy deletion of cancelled tasks.
#[derive(Default)]
struct TaskScheduler {
    now: Tick,
    heap: BinaryHeap<ScheduledTask>,
    tasks: HashMap<String, Arc<Task>>,
}

impl TaskScheduler {
    fn add_task(&mut self, id: String, run: Box<dyn Fn() + Send + Sync>, interval: Tick) -> Result<()> {
        if interval <= 0 {
            return Err(Error::new("interval must be positive"));
        }
        let task = Arc::new(Task {
            run,
            interval,
            cancelled: AtomicBool::new(false),
        });
        self.heap.push(ScheduledTask {
            deadline: self.now + interval,
            task: task.clone(),
        });
        self.tasks.insert(id, task);
        Ok(())
    }

    // Cancelled entries stay in the heap and are skipped when they surface.
    fn remove_task(&mut self, id: &str) {
        if let Some(task) = self.tasks.remove(id) {
            task.cancelled.store(true, Ordering::Release);
        }
    }

    /// Advances the clock and collects the tasks due to run; each is
    /// re-armed at `deadline + interval`.
    fn tick(&mut self, now: Tick) -> Vec<Arc<Task>> {
        self.now = now;

        let mut due = Vec::new();
        while let Some(entry) = self.heap.pop() {
            if entry.deadline > now {
                self.heap.push(entry);
                break;
            }

            if entry.task.cancelled.load(Ordering::Acquire) {
                continue;
            }

            due.push(entry.task.clone());
            self.heap.push(ScheduledTask {
                deadline: entry.deadline + entry.task.interval,
                task: entry.task,
            });
        }
        due
    }
}

struct ManagerState {
    scheduler: TaskScheduler,
    timers: HashMap<String, TimerDesc>,
}

struct ManagerInner {
    db: DbHandle,
    running: AtomicBool,
    start: Instant,
    state: Mutex<ManagerState>,
    timer_ids: IdGenerator,
}

impl ManagerInner {
    fn now_ticks(&self) -> Tick {
        self.start.elapsed().as_secs() as Tick
    }
}

/// Owns the timers and the ticker thread that fires them.
///
/// The ticker polls twice a second, runs every due timer with the state lock
/// released, and exits within one tick of `running` going false.
pub struct TimerManager {
    inner: Arc<ManagerInner>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl TimerManager {
    /// Creates the manager and starts its ticker thread.
    pub fn new(db: DbHandle) -> Self {
        let inner = Arc::new(ManagerInner {
            db,
            running: AtomicBool::new(true),
            start: Instant::now(),
            state: Mutex::new(ManagerState {
                scheduler: TaskScheduler::default(),
                timers: HashMap::new(),
            }),
            timer_ids: IdGenerator::new(),
        });

        let ticker_inner = inner.clone();
        let ticker = std::thread::Builder::new()
            .name("lumidb-timer".to_string())
            .spawn(move || {
                while ticker_inner.running.load(Ordering::Acquire) {
                    let started = Instant::now();

                    let due = {
                        let mut state = ticker_inner.state.lock();
                        let now = ticker_inner.now_ticks();
                        state.scheduler.tick(now)
                    };
                    for task in due {
                        (task.run)();
                    }

                    let elapsed = started.elapsed();
                    if elapsed < TICK_INTERVAL {
                        std::thread::sleep(TICK_INTERVAL - elapsed);
                    }
                }
            })
            .ok();

        Self {
            inner,
            ticker: Mutex::new(ticker),
        }
    }

    /// Schedules `query` to run every `interval` (e.g. `"10s"`); returns the
    /// new timer's id.
    pub fn add_timer(&self, interval: &str, query: &str) -> Result<String> {
        let seconds = parse_interval(interval)?;
        let parsed = parse_query(query)?;
        let db = self.inner.db;

        let id = self.inner.timer_ids.next_id();
        let desc = TimerDesc {
            id: id.clone(),
            interval: interval.to_string(),
            query: query.to_string(),
        };

        let run_desc = desc.clone();
        let manager = Arc::downgrade(&self.inner);
        let run = Box::new(move || {
            // Skip firing once the manager is shutting down; the database
            // pointer is only valid while the plugin is loaded.
            let Some(inner) = manager.upgrade() else {
                return;
            };
            if !inner.running.load(Ordering::Acquire) {
                return;
            }

            tracing::info!(
                id = %run_desc.id,
                query = %run_desc.query,
                interval = %run_desc.interval,
                "timer-plugin: executing timer"
            );
            match db.db().execute(parsed.clone()).join() {
                Ok(table) => {
                    tracing::info!(rows = table.read().num_rows(), "timer-plugin: timer finished");
                }
                Err(e) => {
                    tracing::error!("timer-plugin: timed-task: {e}");
                }
            }
        });

        let mut state = self.inner.state.lock();
        state.scheduler.add_task(id.clone(), run, seconds)?;
        state.timers.insert(id.clone(), desc);
        Ok(id)
    }

    /// Cancels a timer by id.
    pub fn remove_timer(&self, id: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.timers.remove(id).is_none() {
            return Err(Error::new(format!("timer not found, id={id}")));
        }
        state.scheduler.remove_task(id);
        Ok(())
    }

    /// Lists the live timers, most recently added last.
    pub fn list_timers(&self) -> Vec<TimerDesc> {
        let state = self.inner.state.lock();
        let mut timers: Vec<TimerDesc> = state.timers.values().cloned().collect();
        timers.sort_by(|a, b| {
            let a_id = a.id.parse::<i64>().unwrap_or_default();
            let b_id = b.id.parse::<i64>().unwrap_or_default();
            a_id.cmp(&b_id)
        });
        timers
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
        if let Some(ticker) = self.ticker.lock().take() {
            let _ = ticker.join();
        }
    }
}

// Accepts `<number>s`; seconds are the only supported unit.
fn parse_interval(interval: &str) -> Result<Tick> {
    let seconds = interval
        .strip_suffix('s')
        .and_then(|digits| digits.parse::<Tick>().ok())
        .ok_or_else(|| Error::new("invalid time string, only support 's'"))?;
    if seconds <= 0 {
        return Err(Error::new("interval must be positive"));
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_task(counter: &Arc<AtomicUsize>) -> Box<dyn Fn() + Send + Sync> {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("10s").unwrap(), 10);
        assert_eq!(parse_interval("1s").unwrap(), 1);
        assert!(parse_interval("10m").is_err());
        assert!(parse_interval("s").is_err());
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("-5s").is_err());
    }

    #[test]
    fn test_scheduler_fires_and_rearms() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = TaskScheduler::default();
        scheduler
            .add_task("1".to_string(), counting_task(&counter), 2)
            .unwrap();

        assert!(scheduler.tick(1).is_empty());
        for task in scheduler.tick(2) {
            (task.run)();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Re-armed at deadline + interval.
        assert!(scheduler.tick(3).is_empty());
        for task in scheduler.tick(4) {
            (task.run)();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scheduler_catches_up_missed_deadlines() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = TaskScheduler::default();
        scheduler
            .add_task("a".to_string(), counting_task(&counter), 1)
            .unwrap();
        scheduler
            .add_task("b".to_string(), counting_task(&counter), 3)
            .unwrap();

        // A late tick drains every missed deadline: `a` at 1, 2, and 3 plus
        // `b` at 3.
        let due = scheduler.tick(3);
        assert_eq!(due.len(), 4);
    }

    #[test]
    fn test_cancelled_tasks_never_fire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = TaskScheduler::default();
        scheduler
            .add_task("1".to_string(), counting_task(&counter), 1)
            .unwrap();
        scheduler.remove_task("1");

        assert!(scheduler.tick(5).is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = TaskScheduler::default();
        assert!(scheduler
            .add_task("1".to_string(), counting_task(&counter), 0)
            .is_err());
    }
}
