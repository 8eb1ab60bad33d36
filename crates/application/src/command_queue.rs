//! Bounded multi-producer, single-consumer command channel of one tenant.

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use aclgraph_core::{AppError, AppResult, TenantId};

use crate::commands::RequestCommand;
use crate::outcome::CommandReply;

/// Default number of commands a tenant queue holds before producers wait.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Command together with its optional reply channel.
#[derive(Debug)]
pub struct QueuedCommand {
    /// The command.
    pub command: RequestCommand,
    /// Receives the result when the producer awaits it.
    pub reply: Option<oneshot::Sender<CommandReply>>,
    /// Time the command was admitted.
    pub enqueued_at: Instant,
}

impl QueuedCommand {
    /// Delivers a reply if the producer is still waiting for one.
    pub fn respond(self, reply: CommandReply) {
        if let Some(sender) = self.reply {
            // The producer may have stopped waiting.
            let _ = sender.send(reply);
        }
    }
}

/// Why a non-waiting enqueue was refused. The command is handed back.
#[derive(Debug)]
pub enum TryEnqueueError {
    /// The queue is at capacity.
    Full(RequestCommand),
    /// The consumer closed the queue or the tenant is stopping.
    Closed(RequestCommand),
}

/// Producer side of a tenant queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tenant_id: TenantId,
    sender: mpsc::Sender<QueuedCommand>,
    cancel: CancellationToken,
}

/// Consumer side of a tenant queue, owned by the processor.
#[derive(Debug)]
pub struct CommandStream {
    receiver: mpsc::Receiver<QueuedCommand>,
}

/// Creates a bounded queue for one tenant.
///
/// A capacity of zero is raised to one.
#[must_use]
pub fn command_queue(
    tenant_id: TenantId,
    capacity: usize,
    cancel: CancellationToken,
) -> (CommandQueue, CommandStream) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));

    (
        CommandQueue {
            tenant_id,
            sender,
            cancel,
        },
        CommandStream { receiver },
    )
}

impl CommandQueue {
    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Returns the number of free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.sender.capacity()
    }

    /// Admits a command without waiting for its result.
    ///
    /// Waits while the queue is full. Returns [`AppError::Unavailable`] once the
    /// tenant is cancelled or the queue is closed.
    pub async fn enqueue(&self, command: RequestCommand) -> AppResult<()> {
        self.admit(QueuedCommand {
            command,
            reply: None,
            enqueued_at: Instant::now(),
        })
        .await
    }

    /// Admits a command and waits for the processor's reply.
    pub async fn submit(&self, command: RequestCommand) -> CommandReply {
        let (reply, receiver) = oneshot::channel();
        self.admit(QueuedCommand {
            command,
            reply: Some(reply),
            enqueued_at: Instant::now(),
        })
        .await?;

        receiver.await.unwrap_or_else(|_| {
            Err(AppError::Unavailable(format!(
                "tenant {} stopped before replying",
                self.tenant_id
            )))
        })
    }

    /// Admits a command only if a slot is free right now.
    pub fn try_enqueue(&self, command: RequestCommand) -> Result<(), TryEnqueueError> {
        if self.cancel.is_cancelled() {
            return Err(TryEnqueueError::Closed(command));
        }

        self.sender
            .try_send(QueuedCommand {
                command,
                reply: None,
                enqueued_at: Instant::now(),
            })
            .map_err(|error| match error {
                mpsc::error::TrySendError::Full(queued) => TryEnqueueError::Full(queued.command),
                mpsc::error::TrySendError::Closed(queued) => {
                    TryEnqueueError::Closed(queued.command)
                }
            })
    }

    async fn admit(&self, queued: QueuedCommand) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(self.unavailable());
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.unavailable()),
            sent = self.sender.send(queued) => sent.map_err(|_| self.unavailable()),
        }
    }

    fn unavailable(&self) -> AppError {
        AppError::Unavailable(format!(
            "command queue of tenant {} is closed",
            self.tenant_id
        ))
    }
}

impl CommandStream {
    /// Waits for the next command; `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<QueuedCommand> {
        self.receiver.recv().await
    }

    /// Returns the next command if one is already queued.
    pub fn try_recv(&mut self) -> Option<QueuedCommand> {
        self.receiver.try_recv().ok()
    }

    /// Closes the queue for writes; queued commands stay readable.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Returns whether no command is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Returns the number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }
}
