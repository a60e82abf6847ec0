use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::error::{TodoError, TodoResult};
use crate::model::{FileGroup, FileId, Snapshot};
use crate::scanner;
use crate::source::{FileSource, Notice};
use crate::subscribers::{ListenerSet, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Idle,
    Scanning,
}

enum Job {
    Rescan,
    Flush(mpsc::Sender<()>),
    Shutdown,
}

struct Worker {
    sender: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn is_current_thread(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }
}

struct Shared {
    source: Arc<dyn FileSource>,
    snapshot: RwLock<Arc<Snapshot>>,
    scanning: AtomicBool,
    listeners: ListenerSet<Arc<Snapshot>>,
    notices: ListenerSet<Notice>,
}

/// Live index of TODO entries grouped by file.
///
/// Rescans run on a dedicated worker thread, one at a time. Requests that
/// arrive while a rescan is running are coalesced into a single follow-up
/// rescan. Readers always see the last complete snapshot.
pub struct TodoIndex {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl TodoIndex {
    pub fn new(source: Arc<dyn FileSource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                snapshot: RwLock::new(Arc::new(Snapshot::default())),
                scanning: AtomicBool::new(false),
                listeners: ListenerSet::new(),
                notices: ListenerSet::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the rescan worker and queues the initial full scan. Does
    /// nothing if the index is already running.
    pub fn start(&self) -> TodoResult<()> {
        let mut worker = self.worker();
        if worker.is_some() {
            debug!("start: index already running");
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<Job>();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("todo-index".to_string())
            .spawn(move || worker_loop(shared, rx))?;

        let _ = tx.send(Job::Rescan);
        *worker = Some(Worker { sender: tx, handle });
        info!("todo index started");
        Ok(())
    }

    /// Lets the running rescan finish, then joins the worker. Later rescan
    /// requests are ignored until `start` is called again.
    pub fn stop(&self) {
        let Some(worker) = self.worker().take() else {
            return;
        };

        let _ = worker.sender.send(Job::Shutdown);
        if worker.is_current_thread() {
            // Called from a listener: the worker exits once this batch ends.
            debug!("stop: called on the worker thread, not joining");
            return;
        }
        if worker.handle.join().is_err() {
            error!("todo index worker panicked");
        }
        info!("todo index stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker().is_some()
    }

    pub fn request_rescan(&self) {
        match self.worker().as_ref() {
            Some(worker) => {
                if worker.sender.send(Job::Rescan).is_err() {
                    warn!("request_rescan: index worker has exited");
                }
            }
            None => warn!("request_rescan: index is not running, request ignored"),
        }
    }

    /// Blocks until every rescan requested before this call has been applied.
    pub fn flush(&self) -> TodoResult<()> {
        let (resp_tx, resp_rx) = mpsc::channel();
        {
            let worker = self.worker();
            let worker = worker.as_ref().ok_or(TodoError::IndexStopped)?;
            if worker.is_current_thread() {
                return Err(TodoError::FlushFromListener);
            }
            worker
                .sender
                .send(Job::Flush(resp_tx))
                .map_err(|_| TodoError::IndexStopped)?;
        }

        resp_rx.recv().map_err(|_| TodoError::IndexStopped)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.current()
    }

    pub fn state(&self) -> IndexState {
        if self.shared.scanning.load(Ordering::SeqCst) {
            IndexState::Scanning
        } else {
            IndexState::Idle
        }
    }

    /// Registers a listener called after every completed rescan, with the
    /// snapshot that `snapshot()` now returns.
    ///
    /// Listeners run on the worker thread. `flush` called from a listener
    /// fails with `FlushFromListener`; `stop` (or dropping the last handle)
    /// returns without joining and the worker exits after the current batch.
    pub fn subscribe(
        &self,
        listener: impl Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.listeners.subscribe(listener)
    }

    pub fn subscribe_notices(
        &self,
        listener: impl Fn(&Notice) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.notices.subscribe(listener)
    }
}

impl Drop for TodoIndex {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn current(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn rescan(&self) {
        let started = Instant::now();
        self.scanning.store(true, Ordering::SeqCst);

        let groups = match self.collect_groups() {
            Ok(groups) => groups,
            Err(err) => {
                self.scanning.store(false, Ordering::SeqCst);
                let notice = match err {
                    TodoError::NoWorkspace => {
                        info!("rescan: no workspace root, keeping previous snapshot");
                        Notice::NoWorkspace
                    }
                    other => {
                        warn!("rescan: {other}, keeping previous snapshot");
                        Notice::DiscoveryFailed(other.to_string())
                    }
                };
                self.notices.emit(&notice);
                return;
            }
        };

        let snapshot = {
            let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            let next = Arc::new(Snapshot::from_groups(groups, guard.generation + 1));
            *guard = Arc::clone(&next);
            next
        };
        self.scanning.store(false, Ordering::SeqCst);

        info!(
            "rescan: {} TODO(s) in {} file(s), generation {}, took {:?}",
            snapshot.total_count,
            snapshot.groups.len(),
            snapshot.generation,
            started.elapsed()
        );

        self.listeners.emit(&snapshot);
    }

    fn collect_groups(&self) -> TodoResult<Vec<FileGroup>> {
        let root = self.source.root().ok_or(TodoError::NoWorkspace)?;
        debug!("rescan: discovering files under {}", root.display());

        let files = self.source.find_files().map_err(|err| match err {
            TodoError::Discovery(_) | TodoError::NoWorkspace => err,
            other => TodoError::Discovery(other.to_string()),
        })?;

        let contents: Vec<(FileId, String)> = files
            .par_iter()
            .filter_map(|file_id| match self.source.read_text(file_id) {
                Ok(text) => Some((file_id.clone(), text)),
                Err(err) => {
                    warn!("rescan: skipping {file_id}: {err}");
                    None
                }
            })
            .collect();

        debug!(
            "rescan: read {}/{} discovered files",
            contents.len(),
            files.len()
        );

        Ok(scanner::scan(&contents)
            .into_iter()
            .map(|(file_id, entries)| FileGroup {
                display_name: self.source.display_name(&file_id),
                file_id,
                entries,
            })
            .collect())
    }
}

fn worker_loop(shared: Arc<Shared>, rx: mpsc::Receiver<Job>) {
    loop {
        let first = match rx.recv() {
            Ok(job) => job,
            Err(_) => {
                debug!("worker_loop: sender dropped, exiting");
                break;
            }
        };

        let mut batch = vec![first];
        loop {
            match rx.try_recv() {
                Ok(job) => batch.push(job),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    debug!("worker_loop: channel disconnected while draining");
                    break;
                }
            }
        }

        let mut rescans = 0usize;
        let mut waiters = Vec::new();
        let mut shutdown = false;
        for job in batch {
            match job {
                Job::Rescan => rescans += 1,
                Job::Flush(resp) => waiters.push(resp),
                Job::Shutdown => shutdown = true,
            }
        }

        if rescans > 0 {
            debug!("worker_loop: coalesced {rescans} rescan request(s)");
            shared.rescan();
        }

        for resp in waiters {
            let _ = resp.send(());
        }

        if shutdown {
            debug!("worker_loop: shutdown requested");
            break;
        }
    }
}
