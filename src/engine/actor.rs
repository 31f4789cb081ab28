use super::{
    find,
    ingress::{Mailbox, Message},
    internal,
    locks::Locks,
    metrics::Metrics,
    update, Config,
};
use crate::{Dispatcher, Router, Store};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

/// The command actor: accepts inbound index commands and drives each to its
/// terminal acknowledgement.
///
/// Commands run as independent tasks; the per-key locks serialize updates on
/// the same object and membership edits on the same table.
pub struct Engine<S: Store, R: Router, D: Dispatcher<Peer = R::Peer>> {
    store: S,
    router: R,
    dispatcher: D,
    shard_count: u32,
    locks: Locks,
    metrics: Arc<Metrics>,
    mailbox: mpsc::Receiver<Message>,
}

impl<S: Store, R: Router, D: Dispatcher<Peer = R::Peer>> Engine<S, R, D> {
    /// Creates a new engine with the given configuration.
    ///
    /// Returns the engine and a mailbox to submit commands to it.
    pub fn new(cfg: Config<S, R, D>, registry: &mut Registry) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel(cfg.mailbox_size);
        (
            Self {
                store: cfg.store,
                router: cfg.router,
                dispatcher: cfg.dispatcher,
                shard_count: cfg.shard_count,
                locks: Locks::new(),
                metrics: Arc::new(Metrics::init(registry)),
                mailbox: receiver,
            },
            Mailbox::new(sender),
        )
    }

    /// Runs the engine until every mailbox handle is dropped.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        while let Some(message) = self.mailbox.recv().await {
            match message {
                Message::Update { request, origin } => {
                    let driver = update::Driver {
                        store: self.store.clone(),
                        router: self.router.clone(),
                        dispatcher: self.dispatcher.clone(),
                        locks: self.locks.clone(),
                        metrics: self.metrics.clone(),
                        shard_count: self.shard_count,
                    };
                    tokio::spawn(driver.run(request, origin));
                }
                Message::Internal { request, origin } => {
                    tokio::spawn(internal::run(
                        self.store.clone(),
                        self.locks.clone(),
                        self.metrics.clone(),
                        request,
                        origin,
                    ));
                }
                Message::Find { request, origin } => {
                    tokio::spawn(find::run(
                        self.store.clone(),
                        self.metrics.clone(),
                        request,
                        origin,
                    ));
                }
            }
        }
        debug!("mailbox closed");
    }
}
