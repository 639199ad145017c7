//! Component E: the asynchronous search job.

pub mod error;
pub mod file_result;
pub mod filter;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, instrument};
use uuid::Uuid;

pub use error::{PageStatus, SearchError};
pub use file_result::SearchFile;
pub use filter::{apply_sort, SearchFilter, SortOrder};

use crate::types::{Hash, NodeId};

/// One calendar day, used to bucket `Statistics()`'s date histogram.
const DATE_BUCKET_SECONDS: i64 = 86_400;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    pub by_date_bucket: Vec<(i64, u64)>,
    pub by_file_type: HashMap<u8, u64>,
    pub by_file_format: HashMap<u16, u64>,
    pub total: u64,
}

#[derive(Default)]
struct StatsState {
    by_date_bucket: HashMap<i64, u64>,
    by_file_type: HashMap<u8, u64>,
    by_file_format: HashMap<u16, u64>,
    total: u64,
}

impl StatsState {
    fn record(&mut self, file: &SearchFile) {
        let bucket = file.date - file.date.rem_euclid(DATE_BUCKET_SECONDS);
        *self.by_date_bucket.entry(bucket).or_insert(0) += 1;
        *self.by_file_type.entry(file.file_type).or_insert(0) += 1;
        *self.by_file_format.entry(file.file_format).or_insert(0) += 1;
        self.total += 1;
    }

    fn snapshot(&self) -> SearchStatistics {
        let mut by_date_bucket: Vec<(i64, u64)> =
            self.by_date_bucket.iter().map(|(&k, &v)| (k, v)).collect();
        by_date_bucket.sort_by_key(|(bucket, _)| *bucket);
        SearchStatistics {
            by_date_bucket,
            by_file_type: self.by_file_type.clone(),
            by_file_format: self.by_file_format.clone(),
            total: self.total,
        }
    }
}

struct ResultState {
    all_files: Vec<SearchFile>,
    seen: HashSet<(Hash, NodeId)>,
    files: Vec<SearchFile>,
    frozen: Vec<SearchFile>,
    current_offset: usize,
    require_sort: bool,
    filter: SearchFilter,
}

pub struct SearchPage {
    pub files: Vec<SearchFile>,
    pub status: PageStatus,
}

pub struct SearchJob {
    id: Uuid,
    max_results: usize,
    timeout: Duration,
    /// The filter the job was created with. Fixed for the job's
    /// lifetime and gates membership in `AllFiles`; `RuntimeFilter` only
    /// ever changes `ResultState::filter`, which governs `Files`.
    start_filter: SearchFilter,
    results: Mutex<ResultState>,
    stats: Mutex<StatsState>,
    terminated: AtomicBool,
    terminate_notify: Notify,
}

impl SearchJob {
    fn new(max_results: usize, timeout: Duration, filter: SearchFilter) -> Self {
        Self {
            id: Uuid::new_v4(),
            max_results,
            timeout,
            start_filter: filter.clone(),
            results: Mutex::new(ResultState {
                all_files: Vec::new(),
                seen: HashSet::new(),
                files: Vec::new(),
                frozen: Vec::new(),
                current_offset: 0,
                require_sort: false,
                filter,
            }),
            stats: Mutex::new(StatsState::default()),
            terminated: AtomicBool::new(false),
            terminate_notify: Notify::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Worker-facing: dedups by `(hash, nodeID)`. A file matching the
    /// job's immutable start-time filter is appended to `AllFiles`
    /// (and statistics updated) regardless of the current runtime
    /// filter; it is also mirrored into `Files` when it matches that
    /// runtime filter too, so a later `RuntimeFilter` call can still
    /// recover it by rebuilding `Files` from `AllFiles`.
    pub fn add_result(&self, file: SearchFile) {
        if self.is_terminated() || self.results.lock().unwrap().all_files.len() >= self.max_results {
            return;
        }
        let mut state = self.results.lock().unwrap();
        if !state.seen.insert(file.dedup_key()) {
            return;
        }
        if !self.start_filter.matches(&file) {
            return;
        }
        state.all_files.push(file.clone());
        if state.filter.matches(&file) {
            state.files.push(file.clone());
            state.require_sort = true;
        }
        drop(state);
        self.stats.lock().unwrap().record(&file);
    }

    /// Serves from `FrozenFiles` first, then spills into `Files` (sorting
    /// if dirty) to make up any shortfall, freezing index `0..=served`
    /// of `Files` regardless of the caller's local offset so pagination
    /// stays stable across later filter/sort changes.
    fn return_result(&self, offset: usize, limit: usize, mutate: bool) -> SearchPage {
        let mut state = self.results.lock().unwrap();
        let mut served: Vec<SearchFile> = Vec::new();

        if offset < state.frozen.len() {
            let available = state.frozen.len() - offset;
            let take = if limit == 0 { 0 } else { available.min(limit) };
            served.extend_from_slice(&state.frozen[offset..offset + take]);
        }

        if limit != 0 && served.len() < limit {
            let remaining_limit = limit - served.len();
            let file_offset = offset.saturating_sub(state.frozen.len());

            if file_offset >= state.files.len() {
                if mutate && !state.files.is_empty() {
                    let promoted = std::mem::take(&mut state.files);
                    state.frozen.extend(promoted);
                }
            } else {
                if state.require_sort {
                    let sort = state.filter.sort;
                    apply_sort(&mut state.files, sort);
                    if mutate {
                        state.require_sort = false;
                    }
                }
                let end = (file_offset + remaining_limit).min(state.files.len());
                served.extend_from_slice(&state.files[file_offset..end]);

                if mutate {
                    let frozen_chunk: Vec<SearchFile> = state.files.drain(0..end).collect();
                    state.frozen.extend(frozen_chunk);
                }
            }
        }

        let status = if !served.is_empty() {
            PageStatus::Ok
        } else if state.all_files.is_empty() {
            PageStatus::NoResultsYet
        } else {
            PageStatus::NoMore
        };
        SearchPage { files: served, status }
    }

    pub fn return_result_page(&self, offset: usize, limit: usize) -> SearchPage {
        self.return_result(offset, limit, true)
    }

    pub fn peek_result(&self, offset: usize, limit: usize) -> SearchPage {
        self.return_result(offset, limit, false)
    }

    pub fn return_next(&self, limit: usize) -> SearchPage {
        if limit == 0 {
            return SearchPage { files: Vec::new(), status: PageStatus::NoMore };
        }
        let offset = self.results.lock().unwrap().current_offset;
        let page = self.return_result_page(offset, limit);
        self.results.lock().unwrap().current_offset += page.files.len();
        page
    }

    /// Atomically replaces the filter, clears frozen state/cursor, and
    /// rebuilds `Files` from `AllFiles`.
    pub fn runtime_filter(&self, new_filter: SearchFilter) {
        let mut state = self.results.lock().unwrap();
        let sort = new_filter.sort;
        state.files = state
            .all_files
            .iter()
            .filter(|f| new_filter.matches(f))
            .cloned()
            .collect();
        if sort != SortOrder::None {
            apply_sort(&mut state.files, sort);
        }
        state.require_sort = false;
        state.frozen.clear();
        state.current_offset = 0;
        state.filter = new_filter;
    }

    pub fn statistics(&self) -> SearchStatistics {
        self.stats.lock().unwrap().snapshot()
    }

    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
        self.terminate_notify.notify_waiters();
    }

    pub async fn wait_terminate(&self) {
        if self.is_terminated() {
            return;
        }
        self.terminate_notify.notified().await;
    }
}

/// Process-owned (not global) map of in-flight search jobs, created and
/// held by whatever wires the search subsystem together as an instance,
/// never a package-level static.
#[derive(Default)]
pub struct SearchRegistry {
    jobs: Mutex<HashMap<Uuid, std::sync::Arc<SearchJob>>>,
    next_ephemeral: AtomicUsize,
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, filter))]
    pub fn create(&self, timeout: Duration, max_results: usize, filter: SearchFilter) -> std::sync::Arc<SearchJob> {
        let job = std::sync::Arc::new(SearchJob::new(max_results, timeout, filter));
        self.jobs.lock().unwrap().insert(job.id(), job.clone());
        self.next_ephemeral.fetch_add(1, Ordering::Relaxed);
        debug!(job_id = %job.id(), "registered search job");
        job
    }

    pub fn get(&self, id: Uuid) -> Result<std::sync::Arc<SearchJob>, SearchError> {
        self.jobs.lock().unwrap().get(&id).cloned().ok_or(SearchError::UnknownId)
    }

    /// Schedules removal of `id` from the registry after `delay`,
    /// returning immediately.
    pub fn remove_defer(self: &std::sync::Arc<Self>, id: Uuid, delay: Duration) {
        let registry = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.jobs.lock().unwrap().remove(&id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(byte: u8, hash_seed: &str, date: i64) -> SearchFile {
        SearchFile {
            hash: Hash::compute(hash_seed.as_bytes()),
            node_id: NodeId([byte; 32]),
            id: [byte; 16],
            file_type: 1,
            file_format: 0,
            size: 10,
            date,
            name: format!("f{byte}"),
            folder: "top".into(),
            shared_by_count: 0,
        }
    }

    #[test]
    fn add_result_dedups_by_hash_and_node_id() {
        let job = SearchJob::new(100, Duration::from_secs(60), SearchFilter::default());
        let f1 = file(1, "a", 10);
        let f2 = file(2, "b", 20);
        let f1_dup = file(1, "a", 999); // same (hash, nodeID) as f1

        job.add_result(f1.clone());
        job.add_result(f2.clone());
        job.add_result(f1_dup);

        let page = job.return_next(10);
        assert_eq!(page.files.len(), 2);
    }

    #[test]
    fn return_next_zero_limit_does_not_advance_offset() {
        let job = SearchJob::new(100, Duration::from_secs(60), SearchFilter::default());
        job.add_result(file(1, "a", 10));

        let page = job.return_next(0);
        assert!(page.files.is_empty());
        assert_eq!(job.results.lock().unwrap().current_offset, 0);
    }

    #[test]
    fn runtime_filter_change_leaves_already_frozen_results_unchanged() {
        let job = SearchJob::new(100, Duration::from_secs(60), SearchFilter::default());
        job.add_result(file(1, "a", 10));
        job.add_result(file(2, "b", 20));

        let first_page = job.return_next(10);
        assert_eq!(first_page.files.len(), 2);

        job.runtime_filter(SearchFilter { sort: SortOrder::NameAsc, ..Default::default() });
        let frozen = job.results.lock().unwrap().frozen.clone();
        assert_eq!(frozen.len(), 2);
        assert_eq!(frozen[0].dedup_key(), first_page.files[0].dedup_key());
    }

    #[test]
    fn runtime_filter_widening_recovers_results_excluded_by_a_narrower_one() {
        let job = SearchJob::new(100, Duration::from_secs(60), SearchFilter::default());
        job.add_result(file(1, "a", 10));
        job.add_result(file(2, "b", 20));

        // Narrow to file_type that excludes both from `Files`, but both
        // still match the job's start-time filter and stay in `AllFiles`.
        job.runtime_filter(SearchFilter { file_type: Some(99), ..Default::default() });
        assert_eq!(job.return_next(10).status, PageStatus::NoMore);

        // Widen back: both results must be recoverable from `AllFiles`.
        job.runtime_filter(SearchFilter::default());
        let page = job.return_next(10);
        assert_eq!(page.files.len(), 2);
    }

    #[test]
    fn add_result_outside_start_filter_is_excluded_from_statistics() {
        let job = SearchJob::new(100, Duration::from_secs(60), SearchFilter { file_type: Some(1), ..Default::default() });
        let mut excluded = file(1, "a", 10);
        excluded.file_type = 2;
        job.add_result(excluded);
        job.add_result(file(2, "b", 20));

        let stats = job.statistics();
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn empty_job_returns_no_results_yet() {
        let job = SearchJob::new(100, Duration::from_secs(60), SearchFilter::default());
        let page = job.return_next(10);
        assert_eq!(page.status, PageStatus::NoResultsYet);
    }

    #[test]
    fn statistics_snapshot_sorts_date_buckets_ascending() {
        let job = SearchJob::new(100, Duration::from_secs(60), SearchFilter::default());
        job.add_result(file(1, "a", DATE_BUCKET_SECONDS * 5));
        job.add_result(file(2, "b", DATE_BUCKET_SECONDS * 2));

        let stats = job.statistics();
        assert_eq!(stats.total, 2);
        assert!(stats.by_date_bucket[0].0 < stats.by_date_bucket[1].0);
    }

    #[tokio::test]
    async fn terminate_resolves_pending_wait() {
        let job = std::sync::Arc::new(SearchJob::new(10, Duration::from_secs(1), SearchFilter::default()));
        let waiter = job.clone();
        let handle = tokio::spawn(async move { waiter.wait_terminate().await });
        job.terminate();
        handle.await.unwrap();
        assert!(job.is_terminated());
    }
}
