//! Consumer-facing lifecycle notifications and their serial dispatch.
//!
//! The synchronizer enqueues notifications while it holds its lock, which
//! fixes their order. Delivery happens elsewhere: either the host drains the
//! receiver on its own thread, or `spawn_dispatcher` runs a dedicated task.
//! Either way a consumer sees one notification at a time.

use std::sync::Arc;

use spectator_protocol::{RawSessionState, UserId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::GameplayState;

/// Implemented by whatever embeds the synchronizer.
pub trait LifecycleConsumer: Send + Sync {
    /// A watched user reported a new raw state.
    fn on_state_changed(&self, user_id: UserId, state: &RawSessionState);

    /// A user's state resolved against both catalogs. The gameplay state keeps
    /// filling with frames until `on_activity_ended`.
    fn on_activity_started(&self, user_id: UserId, gameplay: Arc<GameplayState>);

    fn on_activity_ended(&self, user_id: UserId);
}

#[derive(Debug, Clone)]
pub enum Notification {
    StateChanged {
        user_id: UserId,
        state: RawSessionState,
    },
    ActivityStarted {
        user_id: UserId,
        gameplay: Arc<GameplayState>,
    },
    ActivityEnded {
        user_id: UserId,
    },
}

impl Notification {
    pub fn user_id(&self) -> UserId {
        match self {
            Notification::StateChanged { user_id, .. }
            | Notification::ActivityStarted { user_id, .. }
            | Notification::ActivityEnded { user_id } => *user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::StateChanged { .. } => "state_changed",
            Notification::ActivityStarted { .. } => "activity_started",
            Notification::ActivityEnded { .. } => "activity_ended",
        }
    }

    pub fn deliver(self, consumer: &dyn LifecycleConsumer) {
        match self {
            Notification::StateChanged { user_id, state } => {
                consumer.on_state_changed(user_id, &state)
            }
            Notification::ActivityStarted { user_id, gameplay } => {
                consumer.on_activity_started(user_id, gameplay)
            }
            Notification::ActivityEnded { user_id } => consumer.on_activity_ended(user_id),
        }
    }
}

pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSender { tx }, NotificationReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationSender {
    pub(crate) fn send(&self, notification: Notification) {
        let user_id = notification.user_id();
        let kind = notification.kind();
        if self.tx.send(notification).is_err() {
            tracing::debug!(user_id = %user_id, kind, "Notification dropped; receiver closed");
        }
    }
}

#[derive(Debug)]
pub struct NotificationReceiver {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl NotificationReceiver {
    /// Waits for the next notification. None once every sender is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, in order.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Some(notification) = self.try_recv() {
            drained.push(notification);
        }
        drained
    }

    /// Delivers everything queued right now on the calling thread.
    pub fn drain_into(&mut self, consumer: &dyn LifecycleConsumer) -> usize {
        let mut delivered = 0;
        while let Some(notification) = self.try_recv() {
            notification.deliver(consumer);
            delivered += 1;
        }
        delivered
    }
}

/// Handle for a running dispatcher task.
pub struct DispatcherHandle {
    task: JoinHandle<usize>,
}

impl DispatcherHandle {
    /// Waits for the dispatcher to finish (every sender dropped) and returns
    /// how many notifications it delivered.
    pub async fn join(self) -> usize {
        match self.task.await {
            Ok(delivered) => delivered,
            Err(err) => {
                tracing::warn!(error = %err, "Notification dispatcher task failed");
                0
            }
        }
    }
}

/// Runs a task that hands each notification to `consumer`, one at a time.
pub fn spawn_dispatcher(
    consumer: Arc<dyn LifecycleConsumer>,
    mut receiver: NotificationReceiver,
) -> DispatcherHandle {
    let task = tokio::spawn(async move {
        let mut delivered = 0usize;
        while let Some(notification) = receiver.recv().await {
            tracing::trace!(
                user_id = %notification.user_id(),
                kind = notification.kind(),
                "Delivering notification"
            );
            notification.deliver(consumer.as_ref());
            delivered += 1;
        }
        tracing::debug!(delivered, "Notification dispatcher stopped");
        delivered
    });
    DispatcherHandle { task }
}
