//! The aggregation state machine.
//!
//! An [`Orchestrator`] is a cheap handle onto a coordination task. Every
//! event that touches an aggregation (a `load()`, a fetch completing, a
//! timer firing, a `cancel()`) is posted as a [`Message`] onto one unbounded
//! queue that only the coordination task reads, so per-generation state is
//! never shared and needs no lock.
//!
//! Lifecycle per resource kind: idle (no entry in `live`) → loading (entry
//! present, flushing partial merges on a debounce timer) → finalized (entry
//! removed after the single final update is pushed).

use crate::aggregate::{merge, AggregateUpdate, FetchOutcome, Generation, Stage};
use crate::client::ResourceClient;
use crate::connection::{Connection, ConnectionSet};
use crate::error::{BasilError, Result};
use crate::fetcher::Fetcher;
use crate::resource::ResourceKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Message {
    Load {
        generation: Generation,
        kind: ResourceKind,
        connections: Arc<ConnectionSet>,
        timeout: Duration,
    },
    Cancel {
        generation: Generation,
    },
    Outcome {
        generation: Generation,
        kind: ResourceKind,
        connection: String,
        outcome: FetchOutcome,
    },
    FlushDue {
        generation: Generation,
        kind: ResourceKind,
    },
    DeadlineDue {
        generation: Generation,
        kind: ResourceKind,
    },
    Shutdown,
}

/// Handle onto a running coordination loop.
///
/// Dropping the handle stops the loop. Updates are pushed to the receiver
/// returned by [`Orchestrator::spawn`].
#[derive(Debug)]
pub struct Orchestrator {
    inbox: UnboundedSender<Message>,
    next_generation: AtomicU64,
}

impl Orchestrator {
    /// Starts a coordination loop on the current tokio runtime.
    ///
    /// `flush_window` is the debounce delay between the first unflushed
    /// outcome and the partial update that carries it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(
        client: Arc<dyn ResourceClient>,
        flush_window: Duration,
    ) -> (Self, UnboundedReceiver<AggregateUpdate>) {
        let (inbox, queue) = mpsc::unbounded_channel();
        let (updates, receiver) = mpsc::unbounded_channel();

        let coordinator = Coordinator {
            fetcher: Fetcher::new(client),
            flush_window,
            inbox: inbox.clone(),
            updates,
            live: HashMap::new(),
        };
        tokio::spawn(coordinator.run(queue));

        let handle = Self {
            inbox,
            next_generation: AtomicU64::new(1),
        };
        (handle, receiver)
    }

    /// Starts aggregating `kind` across `connections`.
    ///
    /// Returns immediately with the new generation id. A generation of the
    /// same kind that is still loading is superseded: its late outcomes are
    /// discarded and it never produces a final update.
    ///
    /// # Errors
    ///
    /// Returns [`BasilError::OrchestratorClosed`] if the loop has stopped.
    pub fn load(
        &self,
        kind: ResourceKind,
        connections: Arc<ConnectionSet>,
        timeout: Duration,
    ) -> Result<Generation> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.send(Message::Load {
            generation,
            kind,
            connections,
            timeout,
        })?;
        Ok(generation)
    }

    /// Tears down a generation. Its timers stop and any outcome still in
    /// flight is discarded when it arrives. Cancelling a generation that has
    /// already finalized or been superseded is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BasilError::OrchestratorClosed`] if the loop has stopped.
    pub fn cancel(&self, generation: Generation) -> Result<()> {
        self.send(Message::Cancel { generation })
    }

    fn send(&self, message: Message) -> Result<()> {
        self.inbox.send(message).map_err(|_| BasilError::OrchestratorClosed)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let _ = self.inbox.send(Message::Shutdown);
    }
}

/// Generation-scoped state, owned by the coordination loop.
struct AggregationState {
    generation: Generation,
    connections: Arc<ConnectionSet>,
    accumulated: HashMap<String, FetchOutcome>,
    flush_timer: Option<JoinHandle<()>>,
    deadline_timer: Option<JoinHandle<()>>,
    dirty: bool,
}

impl AggregationState {
    fn expected(&self) -> usize {
        self.connections.len()
    }

    fn is_complete(&self) -> bool {
        self.accumulated.len() >= self.expected()
    }
}

impl Drop for AggregationState {
    fn drop(&mut self) {
        if let Some(timer) = self.flush_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.deadline_timer.take() {
            timer.abort();
        }
    }
}

struct Coordinator {
    fetcher: Fetcher,
    flush_window: Duration,
    inbox: UnboundedSender<Message>,
    updates: UnboundedSender<AggregateUpdate>,
    live: HashMap<ResourceKind, AggregationState>,
}

impl Coordinator {
    async fn run(mut self, mut queue: UnboundedReceiver<Message>) {
        while let Some(message) = queue.recv().await {
            if matches!(message, Message::Shutdown) || !self.handle(message) {
                break;
            }
        }
        debug!(live = self.live.len(), "orchestrator stopped");
    }

    /// Returns false once the consumer has gone away.
    fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::Load {
                generation,
                kind,
                connections,
                timeout,
            } => self.start(generation, kind, connections, timeout),
            Message::Cancel { generation } => {
                self.cancel(generation);
                true
            }
            Message::Outcome {
                generation,
                kind,
                connection,
                outcome,
            } => self.record(generation, kind, connection, outcome),
            Message::FlushDue { generation, kind } => self.flush(generation, kind),
            Message::DeadlineDue { generation, kind } => {
                if self.is_live(generation, kind) {
                    debug!(generation, %kind, "deadline reached");
                    self.finalize(kind)
                } else {
                    true
                }
            }
            Message::Shutdown => false,
        }
    }

    fn is_live(&self, generation: Generation, kind: ResourceKind) -> bool {
        self.live.get(&kind).is_some_and(|s| s.generation == generation)
    }

    fn start(
        &mut self,
        generation: Generation,
        kind: ResourceKind,
        connections: Arc<ConnectionSet>,
        timeout: Duration,
    ) -> bool {
        if let Some(previous) = self.live.get(&kind) {
            if previous.generation > generation {
                debug!(generation, current = previous.generation, %kind, "load already superseded");
                return true;
            }
            debug!(superseded = previous.generation, generation, %kind, "superseding generation");
        }
        // Replacing the entry drops the previous state and aborts its timers.
        self.live.remove(&kind);

        debug!(generation, %kind, connections = connections.len(), "loading");

        for connection in connections.all() {
            self.spawn_fetch(generation, kind, Arc::clone(connection));
        }

        let deadline_timer = self.spawn_timer(timeout, Message::DeadlineDue { generation, kind });
        self.live.insert(
            kind,
            AggregationState {
                generation,
                connections,
                accumulated: HashMap::new(),
                flush_timer: None,
                deadline_timer: Some(deadline_timer),
                dirty: false,
            },
        );

        if self.live.get(&kind).is_some_and(AggregationState::is_complete) {
            return self.finalize(kind);
        }
        true
    }

    fn spawn_fetch(&self, generation: Generation, kind: ResourceKind, connection: Arc<Connection>) {
        let fetcher = self.fetcher.clone();
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let name = connection.name.clone();
            let outcome = fetcher.fetch(connection, kind).await;
            let _ = inbox.send(Message::Outcome {
                generation,
                kind,
                connection: name,
                outcome,
            });
        });
    }

    fn spawn_timer(&self, delay: Duration, message: Message) -> JoinHandle<()> {
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(message);
        })
    }

    fn cancel(&mut self, generation: Generation) {
        let kind = self
            .live
            .iter()
            .find(|(_, state)| state.generation == generation)
            .map(|(kind, _)| *kind);
        if let Some(kind) = kind {
            debug!(generation, %kind, "generation cancelled");
            self.live.remove(&kind);
        }
    }

    fn record(
        &mut self,
        generation: Generation,
        kind: ResourceKind,
        connection: String,
        outcome: FetchOutcome,
    ) -> bool {
        let Some(state) = self.live.get_mut(&kind).filter(|s| s.generation == generation) else {
            debug!(generation, %kind, connection = %connection, "discarding stale outcome");
            return true;
        };
        if state.connections.get(&connection).is_none() {
            warn!(generation, %kind, connection = %connection, "outcome for unknown connection");
            return true;
        }

        if state.accumulated.insert(connection.clone(), outcome).is_some() {
            warn!(
                generation,
                %kind,
                connection = %connection,
                "duplicate outcome, keeping the latest"
            );
        }
        state.dirty = true;

        if state.is_complete() {
            return self.finalize(kind);
        }

        if state.flush_timer.is_none() {
            let timer = self.spawn_timer(self.flush_window, Message::FlushDue { generation, kind });
            if let Some(state) = self.live.get_mut(&kind) {
                state.flush_timer = Some(timer);
            }
        }
        true
    }

    fn flush(&mut self, generation: Generation, kind: ResourceKind) -> bool {
        let Some(state) = self.live.get_mut(&kind).filter(|s| s.generation == generation) else {
            return true;
        };
        state.flush_timer = None;
        if !state.dirty {
            return true;
        }
        state.dirty = false;

        let update = AggregateUpdate {
            generation,
            kind,
            stage: Stage::Partial,
            reported: state.accumulated.len(),
            expected: state.expected(),
            aggregate: merge(state.connections.all(), &state.accumulated, Stage::Partial),
        };
        debug!(
            generation,
            %kind,
            reported = update.reported,
            expected = update.expected,
            "partial flush"
        );
        self.updates.send(update).is_ok()
    }

    /// Removing the state from `live` is what makes a generation final, so a
    /// second finalize for the same generation cannot happen.
    fn finalize(&mut self, kind: ResourceKind) -> bool {
        let Some(state) = self.live.remove(&kind) else {
            return true;
        };

        let aggregate = merge(state.connections.all(), &state.accumulated, Stage::Final);
        if aggregate.is_total_failure() {
            warn!(generation = state.generation, %kind, "every connection failed");
        } else if let Some(degraded) = aggregate.degraded() {
            warn!(
                generation = state.generation,
                %kind,
                failed = ?degraded.failed_connections,
                "aggregation degraded"
            );
        } else {
            info!(
                generation = state.generation,
                %kind,
                items = aggregate.resources().len(),
                "aggregation complete"
            );
        }

        let update = AggregateUpdate {
            generation: state.generation,
            kind,
            stage: Stage::Final,
            reported: state.accumulated.len(),
            expected: state.expected(),
            aggregate,
        };
        self.updates.send(update).is_ok()
    }
}
