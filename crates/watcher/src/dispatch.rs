//! Routing normalized events to subscriber callbacks
//!
//! Each [`NormalizedEvent`] goes to exactly one handler selected by its change
//! kind. When a [`DispatchContext`] is configured and reports that the
//! current thread is the wrong one, the call is re-issued through it and the
//! dispatcher waits for the result.

use crate::error::WatchError;
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use fsnorm_core::{ChangeKind, NormalizedEvent};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Callback for one kind of normalized event, called with `(root, event)`
pub type EventHandler = Box<dyn Fn(&Path, &NormalizedEvent) -> Result<()> + Send + Sync>;

/// Callback for watch errors, called with `(root, error)`
pub type ErrorHandler = Box<dyn Fn(&Path, &WatchError) -> Result<()> + Send + Sync>;

/// Unit of work marshaled onto a [`DispatchContext`]
pub type Job = Box<dyn FnOnce() -> Result<()> + Send>;

/// One optional handler per change kind, plus errors
#[derive(Default)]
pub struct Subscribers {
    on_created: Option<EventHandler>,
    on_changed: Option<EventHandler>,
    on_deleted: Option<EventHandler>,
    on_renamed: Option<EventHandler>,
    on_error: Option<ErrorHandler>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_created<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &NormalizedEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.on_created = Some(Box::new(f));
        self
    }

    pub fn on_changed<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &NormalizedEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.on_changed = Some(Box::new(f));
        self
    }

    pub fn on_deleted<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &NormalizedEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.on_deleted = Some(Box::new(f));
        self
    }

    pub fn on_renamed<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &NormalizedEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.on_renamed = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &WatchError) -> Result<()> + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Same handler for every change kind
    pub fn on_any<F>(self, f: F) -> Self
    where
        F: Fn(&Path, &NormalizedEvent) -> Result<()> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let (a, b, c) = (Arc::clone(&f), Arc::clone(&f), Arc::clone(&f));
        self.on_created(move |root, ev| a(root, ev))
            .on_changed(move |root, ev| b(root, ev))
            .on_deleted(move |root, ev| c(root, ev))
            .on_renamed(move |root, ev| f(root, ev))
    }

    fn handler_for(&self, kind: ChangeKind) -> Option<&EventHandler> {
        match kind {
            ChangeKind::Created => self.on_created.as_ref(),
            ChangeKind::Changed => self.on_changed.as_ref(),
            ChangeKind::Deleted => self.on_deleted.as_ref(),
            ChangeKind::Renamed => self.on_renamed.as_ref(),
        }
    }

    fn handle_event(&self, root: &Path, event: &NormalizedEvent) -> Result<()> {
        match self.handler_for(event.change_kind) {
            Some(handler) => handler(root, event),
            None => Ok(()),
        }
    }

    fn handle_error(&self, root: &Path, error: &WatchError) -> Result<()> {
        match &self.on_error {
            Some(handler) => handler(root, error),
            None => {
                warn!("unhandled watch error for {}: {}", root.display(), error);
                Ok(())
            }
        }
    }
}

/// Execution context that subscriber calls can be marshaled onto
pub trait DispatchContext: Send + Sync {
    /// True when the calling thread must hand work to [`DispatchContext::invoke`]
    fn invoke_required(&self) -> bool;

    /// Run `job` on the context and wait for its result
    fn invoke(&self, job: Job) -> Result<()>;
}

/// Sends normalized events and errors to subscribers
#[derive(Clone)]
pub struct Dispatcher {
    root: Arc<PathBuf>,
    subscribers: Arc<Subscribers>,
    context: Option<Arc<dyn DispatchContext>>,
}

impl Dispatcher {
    pub fn new(
        root: PathBuf,
        subscribers: Subscribers,
        context: Option<Arc<dyn DispatchContext>>,
    ) -> Self {
        Self {
            root: Arc::new(root),
            subscribers: Arc::new(subscribers),
            context,
        }
    }

    /// Deliver one normalized event
    pub fn dispatch(&self, event: NormalizedEvent) -> Result<()> {
        debug!("dispatching {}", event);
        let root = Arc::clone(&self.root);
        let subscribers = Arc::clone(&self.subscribers);
        self.run(Box::new(move || subscribers.handle_event(&root, &event)))
    }

    /// Deliver a batch in order, stopping at the first failing subscriber
    pub fn dispatch_all(&self, events: Vec<NormalizedEvent>) -> Result<()> {
        for event in events {
            self.dispatch(event)?;
        }
        Ok(())
    }

    /// Deliver a watch error
    pub fn dispatch_error(&self, error: WatchError) -> Result<()> {
        let root = Arc::clone(&self.root);
        let subscribers = Arc::clone(&self.subscribers);
        self.run(Box::new(move || subscribers.handle_error(&root, &error)))
    }

    fn run(&self, job: Job) -> Result<()> {
        match &self.context {
            Some(context) if context.invoke_required() => context.invoke(job),
            _ => job(),
        }
    }
}

type Request = (Job, Sender<Result<()>>);

/// Runs every subscriber call on one dedicated thread
pub struct ThreadContext {
    requests: Option<Sender<Request>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl ThreadContext {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = unbounded::<Request>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            for (job, reply) in rx {
                let _ = reply.send(job());
            }
        })?;

        Ok(Self {
            requests: Some(tx),
            thread_id: handle.thread().id(),
            handle: Some(handle),
        })
    }
}

impl DispatchContext for ThreadContext {
    fn invoke_required(&self) -> bool {
        thread::current().id() != self.thread_id
    }

    fn invoke(&self, job: Job) -> Result<()> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("callback thread has stopped"))?;

        let (reply_tx, reply_rx) = bounded(1);
        requests
            .send((job, reply_tx))
            .map_err(|_| anyhow!("callback thread has stopped"))?;
        reply_rx
            .recv()
            .map_err(|_| anyhow!("callback thread exited before replying"))?
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("callback thread panicked");
            }
        }
    }
}

/// Source of [`TokioContext`] identities
static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    /// Context whose job is running on this thread, if any
    static RUNNING_CONTEXT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Runs subscriber calls on a tokio runtime's blocking pool
///
/// Marshaling is skipped only for calls made from a job this context is
/// already running. Being on some other runtime's thread does not count.
pub struct TokioContext {
    id: usize,
    handle: Handle,
}

impl TokioContext {
    pub fn new(handle: Handle) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            handle,
        }
    }

    /// Context for the runtime the caller is running in
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| anyhow!("no tokio runtime: {e}"))?;
        Ok(Self::new(handle))
    }
}

impl DispatchContext for TokioContext {
    fn invoke_required(&self) -> bool {
        RUNNING_CONTEXT.with(Cell::get) != Some(self.id)
    }

    fn invoke(&self, job: Job) -> Result<()> {
        let id = self.id;
        let (reply_tx, reply_rx) = bounded(1);

        // Waiting on a channel instead of `block_on` works from inside any runtime
        self.handle.spawn_blocking(move || {
            let previous = RUNNING_CONTEXT.with(|running| running.replace(Some(id)));
            let result = job();
            RUNNING_CONTEXT.with(|running| running.set(previous));
            let _ = reply_tx.send(result);
        });

        reply_rx
            .recv()
            .map_err(|_| anyhow!("subscriber task failed before replying"))?
    }
}
