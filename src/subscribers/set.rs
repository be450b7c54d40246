//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each bus [`Event`] to the attached
//! subscribers **without awaiting** their processing, and reports their
//! misbehavior back onto the bus.
//!
//! ## What it guarantees
//! - `emit` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - A panicking subscriber is isolated: the panic is caught, a
//!   [`SubscriberPanicked`](crate::EventKind::SubscriberPanicked) event is
//!   published, and the worker keeps consuming.
//! - A full or closed subscriber queue drops the event for that subscriber
//!   only and publishes a
//!   [`SubscriberOverflow`](crate::EventKind::SubscriberOverflow) event.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No redelivery after an overflow drop.
//!
//! ## Feedback protection
//! The diagnostic events this set publishes are themselves carried on the
//! bus, so [`emit`](SubscriberSet::emit) refuses to fan them out: a
//! subscriber that overflows must not generate overflow events about its
//! own overflow reports. Raw [`subscribe`](crate::Cue::subscribe)
//! receivers still see them.
//!
//! ## Diagram
//! ```text
//!    emit(Arc<Event>)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//!                  │                            │
//!                  └── overflow ─► Bus ◄─ panic ┘
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

use crate::events::{Bus, Event, EventKind};
use crate::hooks::panic_message;

use super::Subscribe;

/// Per-subscriber bounded queue.
struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
///
/// Built per coordinator run; the bus handle is used to publish the
/// overflow/panic diagnostics.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut lanes = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            lanes.push(Lane { name, queue: tx });
            workers.push(Self::spawn_worker(sub, rx, bus.clone()));
        }

        Self { lanes, workers, bus }
    }

    /// Worker loop: deliver events sequentially, containing panics.
    fn spawn_worker(
        sub: Arc<dyn Subscribe>,
        mut rx: mpsc::Receiver<Arc<Event>>,
        bus: Bus,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let fut = sub.on_event(ev.as_ref());
                if let Err(p) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    let info = panic_message(&*p);
                    warn!(subscriber = sub.name(), panic = %info, "subscriber panicked");
                    bus.publish(Event::subscriber_panicked(sub.name(), info));
                }
            }
        })
    }

    /// Fan-out one bus event to every subscriber (non-blocking).
    ///
    /// Subscriber diagnostics are published to the bus but never re-enter
    /// the fan-out (see the module docs on feedback protection).
    pub fn emit(&self, ev: Arc<Event>) {
        if matches!(
            ev.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        ) {
            return;
        }
        for lane in &self.lanes {
            match lane.queue.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = lane.name, "dropped event: queue full");
                    self.bus
                        .publish(Event::subscriber_overflow(lane.name, "queue_full"));
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(subscriber = lane.name, "dropped event: worker closed");
                    self.bus
                        .publish(Event::subscriber_overflow(lane.name, "worker_closed"));
                }
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for h in self.workers {
            let _ = h.await;
        }
    }
}
