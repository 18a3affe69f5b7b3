//! Simple stateless pub-sub event handler
//!
//! Components subscribe to engine events by registering an async handler. Handlers have no access to the internal
//! state of the engine; all they receive is the event itself.
//!
//! Publishing never waits. If a handler's buffer is full, or the handler has gone away, the event is dropped and the
//! loss is logged. Each handler task keeps a running count of the events it processed and how many of them failed,
//! available through [`HandlerStats`].
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};

pub type HandlerResult = Result<(), String>;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync>;

/// Counters shared between a handler task and anyone who wants to observe it.
#[derive(Debug, Clone, Default)]
pub struct HandlerStats {
    succeeded: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl HandlerStats {
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Events that never reached the handler because its buffer was full or it had shut down.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// The number of events the handler has finished with, successfully or not.
    pub fn completed(&self) -> u64 {
        self.succeeded() + self.failed()
    }

    /// Waits until at least `count` events have completed, or the timeout elapses. Returns whether the count was
    /// reached.
    pub async fn wait_for(&self, count: u64, timeout: Duration) -> bool {
        let poll = async {
            while self.completed() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }
}

pub struct EventHandler<E: Send + Sync + 'static> {
    name: &'static str,
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
    stats: HandlerStats,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { name, listener: receiver, sender, handler, stats: HandlerStats::default() }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.name, self.sender.clone(), self.stats.clone())
    }

    pub fn stats(&self) -> HandlerStats {
        self.stats.clone()
    }

    pub async fn start_handler(mut self) {
        let name = self.name;
        debug!("📬️ Starting {name} handler");
        // Once the last producer is dropped the channel closes and the loop below ends.
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ {name} handling event");
            let handler = Arc::clone(&self.handler);
            let stats = self.stats.clone();
            jobs.fetch_add(1, Ordering::SeqCst);
            let job = jobs.clone();
            tokio::spawn(async move {
                match (handler)(ev).await {
                    Ok(()) => {
                        stats.succeeded.fetch_add(1, Ordering::SeqCst);
                        trace!("📬️ {name} event handled");
                    },
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::SeqCst);
                        warn!("📬️ {name} handler failed: {e}");
                    },
                }
                job.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while jobs.load(Ordering::SeqCst) > 0 {
            debug!("📬️ Waiting for {name} jobs to complete");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        debug!("📬️ {name} handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    name: &'static str,
    sender: mpsc::Sender<E>,
    stats: HandlerStats,
}

impl<E: Send + Sync> EventProducer<E> {
    fn new(name: &'static str, sender: mpsc::Sender<E>, stats: HandlerStats) -> Self {
        Self { name, sender, stats }
    }

    /// Hands the event to the handler task without waiting.
    pub fn publish_event(&self, event: E) {
        match self.sender.try_send(event) {
            Ok(()) => trace!("📬️ Event queued for {}", self.name),
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::SeqCst);
                error!("📬️ The {} queue is full. The event has been dropped.", self.name);
            },
            Err(TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::SeqCst);
                error!("📬️ The {} handler is not running. The event has been dropped.", self.name);
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn summing_handler(total: Arc<AtomicU64>) -> Handler<u64> {
        Arc::new(move |v| {
            let total = total.clone();
            Box::pin(async move {
                if v == 13 {
                    return Err("unlucky".to_string());
                }
                total.fetch_add(v, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn events_from_many_producers_are_handled() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let event_handler = EventHandler::new("summing", 16, summing_handler(total.clone()));
        let stats = event_handler.stats();
        let producer_1 = event_handler.subscribe();
        let producer_2 = event_handler.subscribe();
        for i in 0..5 {
            producer_1.publish_event(i * 2 + 1);
            producer_2.publish_event(i * 2);
        }
        drop(producer_1);
        drop(producer_2);
        event_handler.start_handler().await;
        assert_eq!(total.load(Ordering::SeqCst), 45);
        assert_eq!(stats.succeeded(), 10);
        assert_eq!(stats.failed(), 0);
    }

    #[tokio::test]
    async fn failures_are_counted_not_propagated() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let event_handler = EventHandler::new("summing", 4, summing_handler(total.clone()));
        let stats = event_handler.stats();
        let producer = event_handler.subscribe();
        tokio::spawn(event_handler.start_handler());
        producer.publish_event(13);
        producer.publish_event(7);
        assert!(stats.wait_for(2, Duration::from_secs(5)).await);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.succeeded(), 1);
        assert_eq!(total.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn full_queues_drop_events_without_blocking() {
        let total = Arc::new(AtomicU64::new(0));
        let event_handler = EventHandler::new("summing", 1, summing_handler(total));
        let stats = event_handler.stats();
        let producer = event_handler.subscribe();
        // Nobody is draining the channel yet
        producer.publish_event(1);
        producer.publish_event(2);
        assert_eq!(stats.dropped(), 1);
    }
}
