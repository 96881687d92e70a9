//! Routes inbound messages to per-conversation workers.
//!
//! Each conversation gets one tokio task that owns its `Conversation` and
//! handles messages strictly in arrival order. Different conversations run
//! concurrently.
//!
//! Workers whose conversation has gone idle (see `Conversation::is_idle`) and
//! whose queue is empty are dropped periodically, so the map only grows with
//! conversations that are mid-dialogue or hold a plan for `/reset`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{IncomingMessage, MessageStream};
use crate::dialogue::{Controller, Conversation};

/// Dispatches between two sweeps for idle workers.
const REAP_INTERVAL: usize = 64;

/// Shared between the dispatcher and one worker task.
#[derive(Debug)]
struct WorkerStatus {
    /// Messages queued or in flight.
    pending: AtomicUsize,
    /// Whether the conversation was idle after the last handled message.
    idle: AtomicBool,
}

struct Worker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
    status: Arc<WorkerStatus>,
}

impl Worker {
    /// Safe to drop: nothing queued and nothing worth keeping.
    ///
    /// Only the dispatcher enqueues, so a zero `pending` seen here cannot
    /// race with a new message.
    fn is_reclaimable(&self) -> bool {
        if self.handle.is_finished() {
            return true;
        }
        self.status.pending.load(Ordering::SeqCst) == 0
            && self.status.idle.load(Ordering::SeqCst)
    }
}

/// Fans messages out to one worker per conversation.
pub struct Dispatcher {
    controller: Arc<Controller>,
    workers: HashMap<String, Worker>,
    dispatched: usize,
}

impl Dispatcher {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self {
            controller,
            workers: HashMap::new(),
            dispatched: 0,
        }
    }

    /// Number of conversations with a live worker.
    pub fn conversation_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a message on its conversation's worker, spawning it if needed.
    pub fn dispatch(&mut self, message: IncomingMessage) {
        self.dispatched += 1;
        if self.dispatched % REAP_INTERVAL == 0 {
            self.reap_idle();
        }

        let id = message.conversation_id.clone();
        let message = match self.workers.get(&id) {
            Some(worker) => {
                worker.status.pending.fetch_add(1, Ordering::SeqCst);
                match worker.tx.send(message) {
                    Ok(()) => return,
                    // Worker exited (panicked); start a fresh one below.
                    Err(mpsc::error::SendError(message)) => {
                        tracing::warn!(conversation = %id, "Conversation worker gone, restarting");
                        message
                    }
                }
            }
            None => message,
        };

        tracing::debug!(conversation = %id, channel = %message.channel, "New conversation worker");
        let worker = spawn_worker(Arc::clone(&self.controller), id.clone());
        worker.status.pending.fetch_add(1, Ordering::SeqCst);
        // A freshly spawned worker holds its receiver, so this cannot fail.
        let _ = worker.tx.send(message);
        self.workers.insert(id, worker);
    }

    /// Drop workers of idle conversations. Returns how many were removed.
    pub fn reap_idle(&mut self) -> usize {
        let before = self.workers.len();
        self.workers.retain(|_, worker| !worker.is_reclaimable());
        let reaped = before - self.workers.len();
        if reaped > 0 {
            tracing::debug!(reaped, live = self.workers.len(), "Reaped idle conversations");
        }
        reaped
    }

    /// Dispatch every message of `stream`, then wait for the workers to
    /// drain their queues.
    pub async fn run(mut self, mut stream: MessageStream) {
        while let Some(message) = stream.next().await {
            if let Some(name) = &message.user_name {
                tracing::debug!(
                    conversation = %message.conversation_id,
                    user = %name,
                    "Inbound message"
                );
            }
            self.dispatch(message);
        }
        tracing::info!("Inbound stream ended");
        self.shutdown().await;
    }

    /// Close every queue and wait for in-flight messages to finish.
    pub async fn shutdown(self) {
        for (id, worker) in self.workers {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                tracing::warn!(conversation = %id, error = %e, "Conversation worker failed");
            }
        }
    }
}

fn spawn_worker(controller: Arc<Controller>, id: String) -> Worker {
    let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
    let status = Arc::new(WorkerStatus {
        pending: AtomicUsize::new(0),
        idle: AtomicBool::new(true),
    });

    let worker_status = Arc::clone(&status);
    let handle = tokio::spawn(async move {
        let mut conversation = Conversation::new(id);
        while let Some(message) = rx.recv().await {
            controller.handle(&mut conversation, &message.text).await;
            worker_status
                .idle
                .store(conversation.is_idle(), Ordering::SeqCst);
            worker_status.pending.fetch_sub(1, Ordering::SeqCst);
        }
    });
    Worker { tx, handle, status }
}
