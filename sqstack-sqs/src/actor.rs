//! Per-queue actor
//!
//! Each queue's [`RingBuffer`] is owned by exactly one tokio task. Callers hold
//! a cheap [`QueueHandle`] and talk to the task over a single unbounded
//! channel, so every request against one queue is applied in arrival order
//! while different queues run independently. Replies travel back on a
//! `oneshot` slot carried in the request.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::message::Message;
use crate::ring_buffer::RingBuffer;

enum Command {
    Ingest(Vec<Message>),
    Receive {
        max_count: usize,
        reply: oneshot::Sender<Vec<Message>>,
    },
    Depth {
        reply: oneshot::Sender<usize>,
    },
    Stop,
}

/// The actor task went away before the request could be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorStopped;

/// Sending side of a queue actor
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingest(batch) => f.debug_tuple("Ingest").field(&batch.len()).finish(),
            Self::Receive { max_count, .. } => {
                f.debug_struct("Receive").field("max_count", max_count).finish()
            }
            Self::Depth { .. } => f.write_str("Depth"),
            Self::Stop => f.write_str("Stop"),
        }
    }
}

/// Start the actor for `queue` on the current tokio runtime.
pub fn spawn_queue_actor(queue: impl Into<String>) -> (QueueHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = QueueActor {
        queue: queue.into(),
        buffer: RingBuffer::new(),
        rx,
    };
    let task = tokio::spawn(actor.run());
    (QueueHandle { tx }, task)
}

impl QueueHandle {
    /// Append a batch at the tail. Returns once the batch is queued for the
    /// actor, not once it has been applied.
    pub fn ingest(&self, batch: Vec<Message>) -> Result<(), ActorStopped> {
        self.tx.send(Command::Ingest(batch)).map_err(|_| ActorStopped)
    }

    /// Take up to `max_count` messages from the head, oldest first. Empty when
    /// the queue is empty; never waits for messages to arrive.
    pub async fn receive(&self, max_count: usize) -> Result<Vec<Message>, ActorStopped> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Receive { max_count, reply })
            .map_err(|_| ActorStopped)?;
        rx.await.map_err(|_| ActorStopped)
    }

    pub async fn depth(&self) -> Result<usize, ActorStopped> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Depth { reply })
            .map_err(|_| ActorStopped)?;
        rx.await.map_err(|_| ActorStopped)
    }

    /// Ask the actor to exit after serving everything sent before this call.
    pub fn stop(&self) {
        // Already gone is as good as stopped
        let _ = self.tx.send(Command::Stop);
    }
}

struct QueueActor {
    queue: String,
    buffer: RingBuffer<Message>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl QueueActor {
    async fn run(mut self) {
        debug!(queue = %self.queue, "Queue actor started");

        while let Some(command) = self.rx.recv().await {
            trace!(queue = %self.queue, ?command, "Queue actor request");
            match command {
                Command::Ingest(batch) => self.ingest(batch),
                Command::Receive { max_count, reply } => {
                    let batch = self.receive(max_count);
                    // Receive is destructive even when the caller has gone away
                    if let Err(unsent) = reply.send(batch) {
                        debug!(queue = %self.queue, dropped = unsent.len(), "Receiver went away");
                    }
                }
                Command::Depth { reply } => {
                    let _ = reply.send(self.buffer.depth());
                }
                Command::Stop => break,
            }
        }

        debug!(queue = %self.queue, depth = self.buffer.depth(), "Queue actor stopped");
    }

    fn ingest(&mut self, batch: Vec<Message>) {
        for msg in batch {
            self.buffer.enqueue(msg);
        }
    }

    fn receive(&mut self, max_count: usize) -> Vec<Message> {
        let count = max_count.min(self.buffer.depth());
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            batch.push(self.buffer.dequeue());
        }
        batch
    }
}
