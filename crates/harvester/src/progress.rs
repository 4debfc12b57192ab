//! Run-wide progress aggregation.
//!
//! The [`ProgressTracker`] is the only mutable state shared by the download tasks. Its contents
//! are only reachable through snapshots: either on demand with [`ProgressTracker::snapshot`], or
//! pushed to observers through [`ProgressTracker::subscribe`] after every change.
//!
//! A year must be registered with its paper count before any of its papers can complete. The
//! [`YearHandle`] returned by [`ProgressTracker::register_year`] is the way download tasks report
//! completions, so a completion for an unregistered year can't be produced by the pipeline.
//!
//! ```
//! use harvester::progress::{ProgressTracker, Status};
//!
//! let tracker = ProgressTracker::new();
//! let year = tracker.register_year(2023, 4);
//! year.complete(Status::Downloaded).unwrap();
//! year.complete(Status::Failed).unwrap();
//!
//! let snapshot = tracker.snapshot();
//! assert_eq!(snapshot.percent(), 25.0);
//! assert_eq!(snapshot.per_year[&2023].failed, 1);
//! ```

use std::sync::PoisonError;

use tokio::sync::watch;

use super::*;

/// Terminal state of one paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
  /// The PDF was retrieved and written
  Downloaded,
  /// Retrieval or writing failed
  Failed,
}

/// Counters for one year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearProgress {
  /// Papers discovered for the year
  pub total:      usize,
  /// Papers downloaded
  pub downloaded: usize,
  /// Papers that failed
  pub failed:     usize,
}

impl YearProgress {
  /// Downloaded share of the year, in percent.
  pub fn percent(&self) -> f64 { percent(self.downloaded, self.total) }

  /// Papers not yet in a terminal state.
  pub fn pending(&self) -> usize { self.total.saturating_sub(self.downloaded + self.failed) }
}

/// Point-in-time copy of the run progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
  /// Papers discovered across all registered years
  pub total_papers:      usize,
  /// Papers downloaded
  pub downloaded_papers: usize,
  /// Papers that failed
  pub failed_papers:     usize,
  /// Counters per year, ordered by year
  pub per_year:          BTreeMap<u16, YearProgress>,
}

impl ProgressSnapshot {
  /// Overall downloaded share, in percent.
  ///
  /// `0` when nothing was discovered, and never outside `[0, 100]`.
  pub fn percent(&self) -> f64 { percent(self.downloaded_papers, self.total_papers) }

  /// Downloaded share of `year`, in percent; `0` for an unknown year.
  pub fn year_percent(&self, year: u16) -> f64 {
    self.per_year.get(&year).map_or(0.0, YearProgress::percent)
  }

  /// Papers in a terminal state.
  pub fn completed(&self) -> usize { self.downloaded_papers + self.failed_papers }

  /// Whether every discovered paper reached a terminal state.
  pub fn is_finished(&self) -> bool { self.completed() >= self.total_papers }
}

/// `part / total` as a percentage clamped to `[0, 100]`, or `0` for an empty total.
fn percent(part: usize, total: usize) -> f64 {
  if total == 0 {
    return 0.0;
  }
  (part as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Shared progress aggregate.
#[derive(Debug)]
pub struct ProgressTracker {
  /// Authoritative counters
  state: Mutex<ProgressSnapshot>,
  /// Latest snapshot, published after every change
  feed:  watch::Sender<ProgressSnapshot>,
}

impl ProgressTracker {
  /// Creates an empty tracker.
  pub fn new() -> Arc<Self> {
    let (feed, _) = watch::channel(ProgressSnapshot::default());
    Arc::new(Self { state: Mutex::new(ProgressSnapshot::default()), feed })
  }

  /// Adds `total` discovered papers for `year` and returns the handle their tasks complete
  /// through. Registering a year again adds to its total.
  pub fn register_year(self: &Arc<Self>, year: u16, total: usize) -> YearHandle {
    self.update(|state| {
      state.total_papers += total;
      state.per_year.entry(year).or_default().total += total;
    });
    debug!("Registered {total} papers for {year}");
    YearHandle { year, tracker: Arc::clone(self) }
  }

  /// Records the terminal state of one paper of `year`.
  ///
  /// # Errors
  ///
  /// Returns [`HarvesterError::UnregisteredYear`] if `year` was never registered; the counters
  /// are left untouched in that case.
  pub fn on_complete(&self, year: u16, status: Status) -> Result<()> {
    let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    let state = &mut *guard;
    let Some(bucket) = state.per_year.get_mut(&year) else {
      return Err(HarvesterError::UnregisteredYear(year));
    };
    match status {
      Status::Downloaded => {
        bucket.downloaded += 1;
        state.downloaded_papers += 1;
      },
      Status::Failed => {
        bucket.failed += 1;
        state.failed_papers += 1;
      },
    }
    self.feed.send_replace(state.clone());
    Ok(())
  }

  /// A copy of the current counters.
  pub fn snapshot(&self) -> ProgressSnapshot {
    self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Subscribes to the snapshots published after every change.
  pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> { self.feed.subscribe() }

  /// Applies `change` and publishes the result.
  fn update(&self, change: impl FnOnce(&mut ProgressSnapshot)) {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    change(&mut state);
    self.feed.send_replace(state.clone());
  }
}

/// Completion handle for the papers of one registered year.
#[derive(Debug, Clone)]
pub struct YearHandle {
  /// The registered year
  year:    u16,
  /// Tracker the year is registered with
  tracker: Arc<ProgressTracker>,
}

impl YearHandle {
  /// Records the terminal state of one paper of this year.
  pub fn complete(&self, status: Status) -> Result<()> {
    self.tracker.on_complete(self.year, status)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_percent_of_empty_run_is_zero() {
    let tracker = ProgressTracker::new();
    assert_eq!(tracker.snapshot().percent(), 0.0);
    tracker.register_year(2020, 0);
    assert_eq!(tracker.snapshot().percent(), 0.0);
    assert_eq!(tracker.snapshot().year_percent(2020), 0.0);
    assert_eq!(tracker.snapshot().year_percent(1999), 0.0);
  }

  #[test]
  fn test_counts_per_year() {
    let tracker = ProgressTracker::new();
    let y2022 = tracker.register_year(2022, 2);
    let y2023 = tracker.register_year(2023, 3);

    y2022.complete(Status::Downloaded).unwrap();
    y2022.complete(Status::Downloaded).unwrap();
    y2023.complete(Status::Failed).unwrap();

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.total_papers, 5);
    assert_eq!(snapshot.downloaded_papers, 2);
    assert_eq!(snapshot.failed_papers, 1);
    assert_eq!(snapshot.completed(), 3);
    assert!(!snapshot.is_finished());
    assert_eq!(snapshot.year_percent(2022), 100.0);
    assert_eq!(snapshot.year_percent(2023), 0.0);
    assert_eq!(snapshot.per_year[&2023].pending(), 2);
    assert!((snapshot.percent() - 40.0).abs() < 1e-9);
  }

  #[test]
  fn test_percent_is_clamped() {
    let tracker = ProgressTracker::new();
    let year = tracker.register_year(2021, 1);
    // More completions than registered papers can't push the percentage past 100
    year.complete(Status::Downloaded).unwrap();
    year.complete(Status::Downloaded).unwrap();
    assert_eq!(tracker.snapshot().percent(), 100.0);
    assert_eq!(tracker.snapshot().year_percent(2021), 100.0);
  }

  #[test]
  fn test_unregistered_year_is_rejected() {
    let tracker = ProgressTracker::new();
    tracker.register_year(2022, 1);

    assert!(matches!(
      tracker.on_complete(2023, Status::Downloaded),
      Err(HarvesterError::UnregisteredYear(2023))
    ));
    assert_eq!(tracker.snapshot().completed(), 0);
  }

  #[test]
  fn test_registering_twice_adds() {
    let tracker = ProgressTracker::new();
    tracker.register_year(2022, 2);
    tracker.register_year(2022, 3);
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.total_papers, 5);
    assert_eq!(snapshot.per_year[&2022].total, 5);
  }

  #[tokio::test]
  async fn test_subscribers_see_every_change() {
    let tracker = ProgressTracker::new();
    let mut feed = tracker.subscribe();

    let year = tracker.register_year(2023, 2);
    feed.changed().await.unwrap();
    assert_eq!(feed.borrow_and_update().total_papers, 2);

    year.complete(Status::Downloaded).unwrap();
    feed.changed().await.unwrap();
    assert_eq!(*feed.borrow_and_update(), tracker.snapshot());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_completions() {
    let tracker = ProgressTracker::new();
    let year = tracker.register_year(2023, 100);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..100 {
      let year = year.clone();
      tasks.spawn(async move {
        let status = if i % 4 == 0 { Status::Failed } else { Status::Downloaded };
        year.complete(status).unwrap();
      });
    }
    while tasks.join_next().await.is_some() {}

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.downloaded_papers, 75);
    assert_eq!(snapshot.failed_papers, 25);
    assert!(snapshot.is_finished());
  }
}
