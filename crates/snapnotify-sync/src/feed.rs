//! Feed synchronizer.
//!
//! A single actor task owns the cached server feed, the local read state and
//! the set of in-flight mark-reads. Poll ticks, caller commands and network
//! completions are all messages handled one at a time, so no two updates
//! interleave. Network calls run in their own tasks and report back through
//! a completion channel.
//!
//! Fetches are numbered. A response older than the newest one already
//! applied is dropped, so a slow poll can never overwrite a fresher feed.
//!
//! Mutations are optimistic: local state changes (and is persisted) before
//! the request is issued, and is rolled back if the request fails.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use snapnotify_core::{FeedView, Notification};
use snapnotify_store::{LocalReadState, ReadStateStore};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{NotificationApi, SyncError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

const COMMAND_BUFFER: usize = 64;
const NOTICE_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// `None` disables the timer; the feed then only refreshes on demand
    /// and after successful mutations.
    pub poll_interval: Option<Duration>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Some(DEFAULT_POLL_INTERVAL),
        }
    }
}

/// Result of a mark-read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkOutcome {
    /// Marked locally and confirmed by the server.
    Marked,
    /// Already read (server or local); nothing was sent.
    AlreadyRead,
    /// A mark-read for this id is already in flight.
    AlreadyPending,
}

/// User-facing, non-blocking signals about mutation results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
    MarkReadFailed { id: String, reason: String },
    MarkAllReadFailed { reason: String },
    AllMarkedRead { count: usize },
    DeleteFailed { id: String, reason: String },
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Self::MarkReadFailed { .. } => "Failed to mark notification as read".to_string(),
            Self::MarkAllReadFailed { .. } => "Failed to mark all as read".to_string(),
            Self::AllMarkedRead { .. } => "All notifications marked as read".to_string(),
            Self::DeleteFailed { .. } => "Failed to delete notification".to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::AllMarkedRead { .. })
    }
}

type Reply<T> = oneshot::Sender<Result<T, SyncError>>;

enum Command {
    Refresh { reply: Reply<FeedView> },
    MarkRead { id: String, reply: Reply<MarkOutcome> },
    MarkAllRead { reply: Reply<usize> },
    Delete { id: String, reply: Reply<()> },
    ForgetLocal { reply: Reply<()> },
}

enum Completion {
    Fetched {
        seq: u64,
        result: Result<Vec<Notification>, SyncError>,
        reply: Option<Reply<FeedView>>,
    },
    MarkedRead {
        id: String,
        result: Result<(), SyncError>,
        reply: Reply<MarkOutcome>,
    },
    MarkedAllRead {
        added: Vec<String>,
        count: usize,
        result: Result<(), SyncError>,
        reply: Reply<usize>,
    },
    Deleted {
        id: String,
        result: Result<(), SyncError>,
        reply: Reply<()>,
    },
}

/// Cloneable handle to a running synchronizer.
///
/// Once every handle has been dropped the actor stops polling and accepting
/// commands, but only exits after outstanding mutations have completed, so a
/// late failure is still rolled back in persisted state.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<FeedView>,
    notices: broadcast::Sender<Notice>,
}

impl FeedHandle {
    /// Load local read state and start the actor on the current tokio runtime.
    pub fn spawn(
        api: Arc<dyn NotificationApi>,
        store: ReadStateStore,
        config: FeedConfig,
    ) -> Self {
        let local = LocalReadState::load(store);
        let initial = FeedView::reconcile(&[], local.set(), &HashSet::new(), None);
        let (view_tx, view_rx) = watch::channel(initial);
        let (notice_tx, _) = broadcast::channel(NOTICE_BUFFER);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let actor = FeedActor {
            api,
            local,
            feed: Vec::new(),
            fetched_at: None,
            pending: HashSet::new(),
            in_flight: 0,
            next_seq: 0,
            applied_seq: 0,
            view_tx,
            notice_tx: notice_tx.clone(),
            done_tx,
        };
        let ticker = config.poll_interval.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        tokio::spawn(actor.run(command_rx, done_rx, ticker));

        Self {
            commands: command_tx,
            view: view_rx,
            notices: notice_tx,
        }
    }

    /// Latest reconciled view.
    pub fn view(&self) -> FeedView {
        self.view.borrow().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.view.borrow().unread_count
    }

    /// Receiver that is notified after every state change.
    pub fn watch(&self) -> watch::Receiver<FeedView> {
        self.view.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Fetch now and return the view once the response has been applied.
    pub async fn refresh(&self) -> Result<FeedView, SyncError> {
        self.call(|reply| Command::Refresh { reply }).await
    }

    /// Optimistically mark one notification read.
    ///
    /// The view shows it read before the request is sent. On failure the id
    /// is removed from local state again, a [`Notice::MarkReadFailed`] is
    /// broadcast, and the error is returned.
    pub async fn mark_read(&self, id: impl Into<String>) -> Result<MarkOutcome, SyncError> {
        let id = id.into();
        self.call(|reply| Command::MarkRead { id, reply }).await
    }

    /// Optimistically mark every notification of the last fetched feed read.
    ///
    /// Returns the number of notifications covered. On failure exactly the
    /// ids this call added to local state are removed again.
    pub async fn mark_all_read(&self) -> Result<usize, SyncError> {
        self.call(|reply| Command::MarkAllRead { reply }).await
    }

    pub async fn delete(&self, id: impl Into<String>) -> Result<(), SyncError> {
        let id = id.into();
        self.call(|reply| Command::Delete { id, reply }).await
    }

    /// Clear the persisted local read set.
    pub async fn forget_local(&self) -> Result<(), SyncError> {
        self.call(|reply| Command::ForgetLocal { reply }).await
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)?
    }
}

struct FeedActor {
    api: Arc<dyn NotificationApi>,
    local: LocalReadState,
    feed: Vec<Notification>,
    fetched_at: Option<DateTime<Utc>>,
    pending: HashSet<String>,
    /// Mutation requests spawned but not yet applied.
    in_flight: usize,
    next_seq: u64,
    applied_seq: u64,
    view_tx: watch::Sender<FeedView>,
    notice_tx: broadcast::Sender<Notice>,
    done_tx: mpsc::UnboundedSender<Completion>,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl FeedActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut done: mpsc::UnboundedReceiver<Completion>,
        mut ticker: Option<Interval>,
    ) {
        info!(
            poll_secs = ticker.as_ref().map(|t| t.period().as_secs()),
            local_read = self.local.set().len(),
            "feed synchronizer started"
        );
        let mut open = true;
        while open || self.in_flight > 0 {
            tokio::select! {
                cmd = commands.recv(), if open => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        open = false;
                        if self.in_flight > 0 {
                            debug!(in_flight = self.in_flight, "handles dropped; draining mutations");
                        }
                    }
                },
                Some(completion) = done.recv() => self.handle_completion(completion),
                _ = next_tick(&mut ticker), if open => self.spawn_fetch(None),
            }
        }
        debug!("feed synchronizer stopped");
    }

    fn view(&self) -> FeedView {
        FeedView::reconcile(&self.feed, self.local.set(), &self.pending, self.fetched_at)
    }

    fn publish(&self) -> FeedView {
        let view = self.view();
        self.view_tx.send_replace(view.clone());
        view
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.notice_tx.send(notice);
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Refresh { reply } => self.spawn_fetch(Some(reply)),
            Command::MarkRead { id, reply } => self.start_mark_read(id, reply),
            Command::MarkAllRead { reply } => self.start_mark_all_read(reply),
            Command::Delete { id, reply } => self.start_delete(id, reply),
            Command::ForgetLocal { reply } => {
                self.local.clear();
                self.publish();
                info!("cleared local read state");
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched { seq, result, reply } => self.apply_fetch(seq, result, reply),
            Completion::MarkedRead { id, result, reply } => {
                self.in_flight -= 1;
                self.finish_mark_read(id, result, reply)
            }
            Completion::MarkedAllRead {
                added,
                count,
                result,
                reply,
            } => {
                self.in_flight -= 1;
                self.finish_mark_all_read(added, count, result, reply)
            }
            Completion::Deleted { id, result, reply } => {
                self.in_flight -= 1;
                self.finish_delete(id, result, reply)
            }
        }
    }

    fn spawn_mutation<F>(&mut self, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        self.in_flight += 1;
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let _ = done.send(task.await);
        });
    }

    fn spawn_fetch(&mut self, reply: Option<Reply<FeedView>>) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let api = Arc::clone(&self.api);
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_notifications().await;
            let _ = done.send(Completion::Fetched { seq, result, reply });
        });
    }

    fn apply_fetch(
        &mut self,
        seq: u64,
        result: Result<Vec<Notification>, SyncError>,
        reply: Option<Reply<FeedView>>,
    ) {
        let outcome = match result {
            Ok(feed) if seq > self.applied_seq => {
                self.applied_seq = seq;
                self.feed = feed;
                self.fetched_at = Some(Utc::now());
                let view = self.publish();
                debug!(
                    seq,
                    count = view.entries.len(),
                    unread = view.unread_count,
                    "applied notification feed"
                );
                Ok(view)
            }
            Ok(_) => {
                debug!(seq, applied = self.applied_seq, "dropping stale feed response");
                Ok(self.view())
            }
            Err(e) => {
                warn!(seq, error = %e, "notification fetch failed; keeping last feed");
                Err(e)
            }
        };
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn start_mark_read(&mut self, id: String, reply: Reply<MarkOutcome>) {
        if self.pending.contains(&id) {
            let _ = reply.send(Ok(MarkOutcome::AlreadyPending));
            return;
        }
        let server_read = self.feed.iter().any(|n| n.id == id && n.read);
        if server_read || self.local.contains(&id) {
            let _ = reply.send(Ok(MarkOutcome::AlreadyRead));
            return;
        }

        self.local.insert(&id);
        self.pending.insert(id.clone());
        self.publish();

        let api = Arc::clone(&self.api);
        self.spawn_mutation(async move {
            let result = api.mark_read(&id).await;
            Completion::MarkedRead { id, result, reply }
        });
    }

    fn finish_mark_read(
        &mut self,
        id: String,
        result: Result<(), SyncError>,
        reply: Reply<MarkOutcome>,
    ) {
        self.pending.remove(&id);
        match result {
            Ok(()) => {
                info!(id = %id, "notification marked read");
                self.publish();
                self.spawn_fetch(None);
                let _ = reply.send(Ok(MarkOutcome::Marked));
            }
            Err(e) => {
                warn!(id = %id, error = %e, "mark read failed; rolling back");
                self.local.remove(&id);
                self.publish();
                self.notify(Notice::MarkReadFailed {
                    id,
                    reason: e.to_string(),
                });
                let _ = reply.send(Err(e));
            }
        }
    }

    fn start_mark_all_read(&mut self, reply: Reply<usize>) {
        let ids: Vec<&str> = self.feed.iter().map(|n| n.id.as_str()).collect();
        let count = ids.len();
        let added = self.local.insert_all(ids);
        self.publish();

        let api = Arc::clone(&self.api);
        self.spawn_mutation(async move {
            let result = api.mark_all_read().await;
            Completion::MarkedAllRead {
                added,
                count,
                result,
                reply,
            }
        });
    }

    fn finish_mark_all_read(
        &mut self,
        added: Vec<String>,
        count: usize,
        result: Result<(), SyncError>,
        reply: Reply<usize>,
    ) {
        match result {
            Ok(()) => {
                info!(count, "all notifications marked read");
                self.notify(Notice::AllMarkedRead { count });
                self.spawn_fetch(None);
                let _ = reply.send(Ok(count));
            }
            Err(e) => {
                warn!(rolled_back = added.len(), error = %e, "mark all read failed; rolling back");
                self.local.remove_all(added.iter().map(String::as_str));
                self.publish();
                self.notify(Notice::MarkAllReadFailed {
                    reason: e.to_string(),
                });
                let _ = reply.send(Err(e));
            }
        }
    }

    fn start_delete(&mut self, id: String, reply: Reply<()>) {
        let api = Arc::clone(&self.api);
        self.spawn_mutation(async move {
            let result = api.delete(&id).await;
            Completion::Deleted { id, result, reply }
        });
    }

    fn finish_delete(&mut self, id: String, result: Result<(), SyncError>, reply: Reply<()>) {
        match result {
            Ok(()) => {
                info!(id = %id, "notification deleted");
                self.feed.retain(|n| n.id != id);
                self.publish();
                self.spawn_fetch(None);
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                warn!(id = %id, error = %e, "delete failed");
                self.notify(Notice::DeleteFailed {
                    id,
                    reason: e.to_string(),
                });
                let _ = reply.send(Err(e));
            }
        }
    }
}
