//! Serialized delivery of lifecycle transitions on a dedicated thread.

use std::{
    io,
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use tracing::{debug, warn};
use werecord_core::lifecycle::{LifecycleObserver, LifecycleState};

const NOTIFIER_THREAD_NAME: &str = "werecord-notifier";

/// Handle returned by [`Notifier::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

enum Message {
    Attach(ObserverId, Arc<dyn LifecycleObserver>),
    Detach(ObserverId),
    Transition(LifecycleState),
    Flush(mpsc::Sender<()>),
}

/// Owns the observer list. Every callback runs on one thread, in the order
/// the transitions were published, and only observers attached before a
/// transition see it.
pub struct Notifier {
    tx: Option<mpsc::Sender<Message>>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
}

impl Notifier {
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Message>();
        let handle = thread::Builder::new()
            .name(NOTIFIER_THREAD_NAME.to_owned())
            .spawn(move || {
                let mut observers: Vec<(ObserverId, Arc<dyn LifecycleObserver>)> = Vec::new();
                while let Ok(message) = rx.recv() {
                    match message {
                        Message::Attach(id, observer) => observers.push((id, observer)),
                        Message::Detach(id) => observers.retain(|(held, _)| *held != id),
                        Message::Transition(state) => {
                            debug!(%state, observers = observers.len(), "delivering transition");
                            for (_, observer) in &observers {
                                observer.on_state_changed(state);
                            }
                        }
                        Message::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            })?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            next_id: 0,
        })
    }

    pub fn attach(&mut self, observer: Arc<dyn LifecycleObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.send(Message::Attach(id, observer));
        id
    }

    pub fn detach(&self, id: ObserverId) {
        self.send(Message::Detach(id));
    }

    pub fn publish(&self, state: LifecycleState) {
        self.send(Message::Transition(state));
    }

    /// Block until everything queued so far has been delivered.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        self.send(Message::Flush(done_tx));
        let _ = done_rx.recv();
    }

    fn send(&self, message: Message) {
        let Some(tx) = &self.tx else { return };
        if tx.send(message).is_err() {
            warn!("notifier thread is gone; dropping message");
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue drains.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("notifier thread panicked");
            }
        }
    }
}
