//! Hook dispatch for marketplace events
//!
//! Every hook gets its own bounded queue. The order and webhook APIs push events into it after the change that
//! produced them has been committed, and each event runs the hook on a task of its own. Hooks only ever see the event.
//!
//! The queue closes once the last [`EventProducer`] is dropped. The dispatcher then waits for the hook calls still in
//! flight before it exits.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct HookDispatcher<E: Send + 'static> {
    name: &'static str,
    queue: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    hook: Handler<E>,
}

impl<E: Send + 'static> HookDispatcher<E> {
    pub fn new(name: &'static str, capacity: usize, hook: Handler<E>) -> Self {
        let (sender, queue) = mpsc::channel(capacity);
        Self { name, queue, sender, hook }
    }

    pub fn producer(&self) -> EventProducer<E> {
        EventProducer { sender: self.sender.clone() }
    }

    /// Runs the hook for every queued event until all producers are gone. Returns the number of events dispatched.
    pub async fn run(self) -> usize {
        let Self { name, mut queue, sender, hook } = self;
        drop(sender);
        debug!("📬️ Dispatching {name} events");
        let mut in_flight = JoinSet::new();
        let mut dispatched = 0;
        loop {
            tokio::select! {
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => report(name, result),
                event = queue.recv() => match event {
                    Some(event) => {
                        trace!("📬️ Dispatching {name} event");
                        in_flight.spawn(hook(event));
                        dispatched += 1;
                    },
                    None => break,
                },
            }
        }
        if !in_flight.is_empty() {
            debug!("📬️ Waiting for {} {name} hooks to finish", in_flight.len());
        }
        while let Some(result) = in_flight.join_next().await {
            report(name, result);
        }
        debug!("📬️ {name} dispatcher has shut down after {dispatched} events");
        dispatched
    }
}

fn report(name: &str, result: Result<(), JoinError>) {
    if let Err(e) = result {
        warn!("📬️ A {name} hook did not complete. {e}");
    }
}

/// The sending half of a hook's queue.
pub struct EventProducer<E> {
    sender: mpsc::Sender<E>,
}

impl<E> Clone for EventProducer<E> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

impl<E: Send> EventProducer<E> {
    /// Waits for room in the queue if the hook is falling behind. Events published after the dispatcher has stopped
    /// are logged and dropped.
    pub async fn publish(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ An event was published after its hook dispatcher stopped. It has been dropped.");
        }
    }
}
