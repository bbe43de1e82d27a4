//! Concurrent processing of catalogue entries.
//!
//! Each worker pulls whole entries off a shared queue. Every entry gets a
//! fresh browser session that is released when the entry is done, and its
//! links are resolved in catalogue order. Progress lines from all workers go
//! through one channel to a single printing task.

use crate::browser::{PageContext, SessionFactory};
use crate::error::Error;
use crate::parsers::Entry;
use crate::resolver::LinkResolver;
use crate::results::{PageReport, ResolutionOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Stops the pool from starting new entries. Entries already in progress
/// are finished.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type Progress = mpsc::UnboundedSender<String>;
type JobQueue = Arc<Mutex<mpsc::Receiver<Entry>>>;

/// Runs entries concurrently, one session per entry
pub struct WorkerPool<F: SessionFactory> {
    factory: Arc<F>,
    resolver: Arc<LinkResolver>,
    max_workers: usize,
    cancel: CancelFlag,
}

impl<F: SessionFactory> WorkerPool<F> {
    pub fn new(factory: F, resolver: LinkResolver, max_workers: usize) -> Self {
        Self {
            factory: Arc::new(factory),
            resolver: Arc::new(resolver),
            max_workers: max_workers.max(1),
            cancel: CancelFlag::new(),
        }
    }

    /// Use an externally controlled cancellation flag
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Number of workers that will run for this many entries
    pub fn worker_count(&self, entries: usize) -> usize {
        self.max_workers.min(entries).max(1)
    }

    /// Process every entry and return page reports in completion order.
    ///
    /// Entries not started before cancellation have no report.
    pub async fn run(&self, entries: Vec<Entry>) -> Vec<PageReport> {
        if entries.is_empty() {
            return Vec::new();
        }
        let num_workers = self.worker_count(entries.len());
        ::log::info!(
            "Starting parallel processing of {} pages with {} workers",
            entries.len(),
            num_workers
        );

        let (job_tx, job_rx) = mpsc::channel::<Entry>(entries.len());
        for entry in entries {
            // capacity equals the number of entries, so this never waits
            if job_tx.send(entry).await.is_err() {
                break;
            }
        }
        drop(job_tx);
        let job_rx: JobQueue = Arc::new(Mutex::new(job_rx));

        let (progress_tx, progress_rx) = mpsc::unbounded_channel::<String>();
        let printer = spawn_progress_printer(progress_rx);

        let (result_tx, mut result_rx) = mpsc::channel::<PageReport>(num_workers);
        for worker_id in 1..=num_workers {
            spawn_worker(
                worker_id,
                Arc::clone(&self.factory),
                Arc::clone(&self.resolver),
                Arc::clone(&job_rx),
                result_tx.clone(),
                progress_tx.clone(),
                self.cancel.clone(),
            );
        }
        // Each worker holds its own sender, the channel closes when all are done
        drop(result_tx);
        drop(progress_tx);

        let mut reports = Vec::new();
        while let Some(report) = result_rx.recv().await {
            reports.push(report);
        }

        if let Err(e) = printer.await {
            ::log::warn!("Progress printer stopped abnormally: {}", e);
        }
        ::log::info!("All {} workers have completed", num_workers);
        reports
    }
}

/// Prints progress lines one at a time so workers never interleave output
fn spawn_progress_printer(mut progress_rx: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = progress_rx.recv().await {
            println!("  {message}");
        }
    })
}

fn spawn_worker<F: SessionFactory>(
    worker_id: usize,
    factory: Arc<F>,
    resolver: Arc<LinkResolver>,
    job_rx: JobQueue,
    result_tx: mpsc::Sender<PageReport>,
    progress: Progress,
    cancel: CancelFlag,
) {
    ::log::trace!("Spawning worker {}", worker_id);

    tokio::spawn(async move {
        while let Some(entry) = get_next_entry(worker_id, &job_rx, &cancel).await {
            let page = entry.page.clone();
            let job = tokio::spawn(process_entry(
                worker_id,
                Arc::clone(&factory),
                Arc::clone(&resolver),
                entry,
                progress.clone(),
            ));

            let report = match job.await {
                Ok(report) => report,
                Err(e) => {
                    let _ = progress.send(format!(
                        "Worker {worker_id}: Error processing entry {page}: {e}"
                    ));
                    let error = Error::Job(e.to_string());
                    PageReport::failed(&page, worker_id, Vec::new(), error.to_string())
                }
            };

            if let Err(e) = result_tx.send(report).await {
                ::log::error!("Worker {} failed to send result: {}", worker_id, e);
                break;
            }
        }
        ::log::debug!("Worker {} completed - no more entries to process", worker_id);
    });
}

/// Gets the next entry from the queue unless the run was cancelled
async fn get_next_entry(worker_id: usize, job_rx: &JobQueue, cancel: &CancelFlag) -> Option<Entry> {
    let mut rx = job_rx.lock().await;
    // checked under the lock so a cancel seen by one waiting worker holds for all
    if cancel.is_cancelled() {
        ::log::info!("Worker {} stopping: run was cancelled", worker_id);
        return None;
    }
    rx.recv().await
}

/// Process one entry with its own session. The session is released on every
/// path out of this function.
async fn process_entry<F: SessionFactory>(
    worker_id: usize,
    factory: Arc<F>,
    resolver: Arc<LinkResolver>,
    entry: Entry,
    progress: Progress,
) -> PageReport {
    let started = Instant::now();
    let total = entry.broken_links.len();
    let _ = progress.send(format!(
        "Worker {worker_id}: Processing page {} with {total} broken links",
        entry.page
    ));

    let mut ctx = match factory.open(worker_id).await {
        Ok(ctx) => ctx,
        Err(e) => {
            let _ = progress.send(format!(
                "Worker {worker_id}: Error processing entry {}: {e}",
                entry.page
            ));
            return PageReport::failed(&entry.page, worker_id, Vec::new(), e.to_string());
        }
    };

    let outcomes = resolve_entry(worker_id, &mut ctx, &resolver, &entry, &progress).await;
    // a panic above skips this, the context's drop guard releases it then
    ctx.close().await;

    let elapsed = started.elapsed().as_secs_f64();
    let _ = progress.send(format!(
        "Worker {worker_id}: Completed page {} in {elapsed:.1}s",
        entry.page
    ));

    PageReport {
        page: entry.page,
        outcomes,
        processing_time_seconds: elapsed,
        worker_id,
        error: None,
    }
}

/// Resolve an entry's links in catalogue order on one session
async fn resolve_entry<C: PageContext + ?Sized>(
    worker_id: usize,
    ctx: &mut C,
    resolver: &LinkResolver,
    entry: &Entry,
    progress: &Progress,
) -> Vec<ResolutionOutcome> {
    let total = entry.broken_links.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, broken_link) in entry.broken_links.iter().enumerate() {
        let _ = progress.send(format!(
            "Worker {worker_id}: [{}/{total}] Checking: {broken_link}",
            index + 1
        ));

        let outcome = resolver.resolve(ctx, &entry.page, broken_link).await;
        let message = match (&outcome.fix, &outcome.error) {
            (Some(fix), _) => format!("Worker {worker_id}: [SUCCESS] Found fix: {fix}"),
            (None, Some(error)) => format!("Worker {worker_id}: [FAILED] {error}"),
            (None, None) => format!("Worker {worker_id}: [FAILED] No fix found"),
        };
        let _ = progress.send(message);
        outcomes.push(outcome);
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::snapshot::{Site, SnapshotContext, SnapshotFactory, TrackedSnapshot};
    use crate::browser::{Anchor, AnchorScope, Heading};
    use crate::error::Result;
    use crate::filter::UrlFilter;
    use crate::parsers::SourceDocs;
    use crate::probe::RedirectProbe;
    use async_trait::async_trait;
    use std::time::Duration;
    use url::Url;

    const BASE: &str = "http://127.0.0.1:1";

    fn resolver() -> LinkResolver {
        LinkResolver::new(
            BASE,
            RedirectProbe::new(BASE, Duration::from_millis(200)).unwrap(),
            SourceDocs::new("/nonexistent-docs-root"),
            UrlFilter::for_site(BASE, &[]).unwrap(),
            Duration::from_millis(10),
            3,
        )
    }

    fn site() -> Site {
        Site::new()
            .with_page(
                &format!("{BASE}/docs/a"),
                r#"<nav><a href="/guides/track/logging">Logging</a></nav>"#,
            )
            .with_page(
                &format!("{BASE}/docs/b"),
                r#"<nav><a href="/models/sweeps">Sweeps</a></nav>"#,
            )
    }

    fn entry(page: &str, links: &[&str]) -> Entry {
        Entry::new(page, links.iter().map(|l| l.to_string()).collect())
    }

    struct UnavailableBrowser;

    #[async_trait]
    impl SessionFactory for UnavailableBrowser {
        type Context = SnapshotContext;

        async fn open(&self, worker_id: usize) -> Result<Self::Context> {
            Err(Error::Navigation(format!(
                "worker {worker_id}: webdriver not reachable"
            )))
        }
    }

    type NavigateHook = Arc<dyn Fn(&str) + Send + Sync>;

    /// Snapshot sessions that run a hook before every page load
    struct HookedFactory {
        inner: SnapshotFactory,
        on_navigate: NavigateHook,
    }

    struct HookedContext {
        inner: TrackedSnapshot,
        on_navigate: NavigateHook,
    }

    #[async_trait]
    impl PageContext for HookedContext {
        async fn navigate(&mut self, url: &str) -> bool {
            (self.on_navigate)(url);
            self.inner.navigate(url).await
        }
        async fn current_url(&mut self) -> Option<Url> {
            self.inner.current_url().await
        }
        async fn list_anchors(&mut self, scope: AnchorScope) -> Vec<Anchor> {
            self.inner.list_anchors(scope).await
        }
        async fn find_headings(&mut self) -> Vec<Heading> {
            self.inner.find_headings().await
        }
        async fn find_by_exact_text(&mut self, text: &str) -> Option<Anchor> {
            self.inner.find_by_exact_text(text).await
        }
        async fn find_by_partial_text(&mut self, text: &str) -> Option<Anchor> {
            self.inner.find_by_partial_text(text).await
        }
        async fn has_id(&mut self, id: &str) -> bool {
            self.inner.has_id(id).await
        }
        async fn click_and_observe(&mut self, anchor: &Anchor, max_wait: Duration) -> Result<Url> {
            self.inner.click_and_observe(anchor, max_wait).await
        }
        async fn go_back(&mut self) -> bool {
            self.inner.go_back().await
        }
        async fn close(&mut self) {
            self.inner.close().await
        }
    }

    #[async_trait]
    impl SessionFactory for HookedFactory {
        type Context = HookedContext;

        async fn open(&self, worker_id: usize) -> Result<Self::Context> {
            Ok(HookedContext {
                inner: self.inner.open(worker_id).await?,
                on_navigate: Arc::clone(&self.on_navigate),
            })
        }
    }

    #[tokio::test]
    async fn test_every_entry_gets_a_report() {
        let factory = SnapshotFactory::new(site());
        let pool = WorkerPool::new(factory.clone(), resolver(), 2);

        let reports = pool
            .run(vec![
                entry("docs/a.mdx", &["/guides/track/log#x", "/nothing/here"]),
                entry("docs/b.mdx", &["/models/sweep"]),
            ])
            .await;

        assert_eq!(reports.len(), 2);
        let a = reports.iter().find(|r| r.page == "docs/a.mdx").unwrap();
        assert_eq!(a.outcomes.len(), 2);
        assert_eq!(a.outcomes[0].broken.to_string(), "/guides/track/log#x");
        assert_eq!(
            a.outcomes[0].fix.as_ref().unwrap().to_string(),
            "/guides/track/logging#x"
        );
        assert_eq!(a.outcomes[1].broken.to_string(), "/nothing/here");
        assert!(a.error.is_none());
        assert!((1..=2).contains(&a.worker_id));

        assert_eq!(factory.opened(), 2);
        assert_eq!(factory.closed(), 2);
    }

    #[tokio::test]
    async fn test_session_failure_becomes_page_error() {
        let pool = WorkerPool::new(UnavailableBrowser, resolver(), 4);
        let reports = pool.run(vec![entry("docs/a.mdx", &["/x"])]).await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].outcomes.is_empty());
        assert!(reports[0].error.as_ref().unwrap().contains("webdriver not reachable"));
    }

    #[tokio::test]
    async fn test_unloadable_page_marks_every_link() {
        let factory = SnapshotFactory::new(site());
        let pool = WorkerPool::new(factory.clone(), resolver(), 1);
        let reports = pool.run(vec![entry("docs/gone.mdx", &["/x", "/y"])]).await;

        let outcomes = &reports[0].outcomes;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.fix.is_none() && o.error.is_some()));
        assert_eq!(factory.closed(), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_siblings() {
        let inner = SnapshotFactory::new(site());
        let pool = WorkerPool::new(
            HookedFactory {
                inner: inner.clone(),
                on_navigate: Arc::new(|url: &str| {
                    if url.ends_with("/docs/boom") {
                        panic!("renderer crashed");
                    }
                }),
            },
            resolver(),
            1,
        );

        let reports = pool
            .run(vec![
                entry("docs/boom.mdx", &["/x"]),
                entry("docs/b.mdx", &["/models/sweep"]),
            ])
            .await;

        assert_eq!(reports.len(), 2);
        let boom = reports.iter().find(|r| r.page == "docs/boom.mdx").unwrap();
        assert!(boom.error.as_ref().unwrap().starts_with("job failed"));
        let b = reports.iter().find(|r| r.page == "docs/b.mdx").unwrap();
        assert!(b.error.is_none());
        // the panicked session is released by drop
        assert_eq!(inner.opened(), inner.closed());
    }

    #[tokio::test]
    async fn test_cancelled_run_starts_nothing() {
        let factory = SnapshotFactory::new(site());
        let cancel = CancelFlag::new();
        cancel.cancel();
        let pool = WorkerPool::new(factory.clone(), resolver(), 2).with_cancel_flag(cancel);

        let reports = pool.run(vec![entry("docs/a.mdx", &["/x"])]).await;
        assert!(reports.is_empty());
        assert_eq!(factory.opened(), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_finishes_current_entry_only() {
        let inner = SnapshotFactory::new(site());
        let cancel = CancelFlag::new();
        let flag = cancel.clone();
        let pool = WorkerPool::new(
            HookedFactory {
                inner: inner.clone(),
                // interrupt arrives while the first entry is loading its page
                on_navigate: Arc::new(move |_: &str| flag.cancel()),
            },
            resolver(),
            1,
        )
        .with_cancel_flag(cancel);

        let reports = pool
            .run(vec![
                entry("docs/a.mdx", &["/guides/track/log#x", "/nothing/here"]),
                entry("docs/b.mdx", &["/models/sweep"]),
                entry("docs/c.mdx", &["/z"]),
            ])
            .await;

        assert_eq!(reports.len(), 1);
        let a = &reports[0];
        assert_eq!(a.page, "docs/a.mdx");
        assert!(a.error.is_none());
        assert_eq!(a.outcomes.len(), 2);
        assert!(a.outcomes[0].is_fixed());
        assert_eq!(inner.opened(), 1);
        assert_eq!(inner.closed(), 1);
    }

    #[test]
    fn test_worker_count_bounds() {
        let pool = WorkerPool::new(SnapshotFactory::new(Site::new()), resolver(), 15);
        assert_eq!(pool.worker_count(3), 3);
        assert_eq!(pool.worker_count(40), 15);
        assert_eq!(pool.worker_count(0), 1);
    }

    #[tokio::test]
    async fn test_empty_catalogue() {
        let pool = WorkerPool::new(SnapshotFactory::new(Site::new()), resolver(), 2);
        assert!(pool.run(Vec::new()).await.is_empty());
    }
}
