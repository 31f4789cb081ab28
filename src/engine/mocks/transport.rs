use crate::{
    codec::Codec,
    wire::{status, Reply, ReplyEntry, Request},
    Delivery, Dispatcher, Error,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;

/// How the scripted remote side answers a dispatched edit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Behavior {
    /// Reply with a single-entry result frame, then terminate successfully.
    #[default]
    Ack,
    /// Terminate with the given status, without a result frame.
    Fail(i32),
    /// Refuse the dispatch itself.
    Refuse,
    /// Drop the reply stream without a terminal event.
    Vanish,
}

/// A [Dispatcher] that records every dispatched request and answers per a
/// scripted per-peer behavior.
#[derive(Clone, Default)]
pub struct Transport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    sent: Vec<(u64, Request)>,
    behaviors: HashMap<u64, Behavior>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the behavior of one peer.
    pub fn behave(&self, peer: u64, behavior: Behavior) {
        self.inner.lock().unwrap().behaviors.insert(peer, behavior);
    }

    /// Every request dispatched so far, in order.
    pub fn sent(&self) -> Vec<(u64, Request)> {
        self.inner.lock().unwrap().sent.clone()
    }
}

impl Dispatcher for Transport {
    type Peer = u64;

    async fn dispatch(
        &mut self,
        peer: u64,
        request: Request,
    ) -> Result<mpsc::Receiver<Delivery>, Error> {
        let behavior = {
            let mut inner = self.inner.lock().unwrap();
            let behavior = inner.behaviors.get(&peer).copied().unwrap_or_default();
            if behavior != Behavior::Refuse {
                inner.sent.push((peer, request.clone()));
            }
            behavior
        };
        match behavior {
            Behavior::Ack => {
                let (sender, receiver) = mpsc::channel(2);
                let reply = Reply {
                    entries: request
                        .entries
                        .iter()
                        .map(|entry| ReplyEntry {
                            id: entry.id,
                            status: status::OK,
                        })
                        .collect(),
                };
                sender
                    .try_send(Delivery::Frame(reply.encode()))
                    .expect("mock reply frame");
                sender
                    .try_send(Delivery::Done(status::OK))
                    .expect("mock terminal");
                Ok(receiver)
            }
            Behavior::Fail(errno) => {
                let (sender, receiver) = mpsc::channel(1);
                sender
                    .try_send(Delivery::Done(errno))
                    .expect("mock terminal");
                Ok(receiver)
            }
            Behavior::Refuse => Err(Error::Dispatch("peer refused")),
            Behavior::Vanish => {
                let (_sender, receiver) = mpsc::channel(1);
                Ok(receiver)
            }
        }
    }
}
