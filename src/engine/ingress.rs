use crate::wire::{Frame, Request};
use tokio::sync::mpsc;

/// Commands accepted by the engine.
pub enum Message {
    Update { request: Request, origin: Origin },
    Internal { request: Request, origin: Origin },
    Find { request: Request, origin: Origin },
}

/// Where a command's reply frames are delivered.
///
/// Wraps the originator's connection: intermediate frames and the terminal
/// ack are pushed here in completion order. Delivery is best-effort; an
/// originator that went away simply discards its frames.
#[derive(Clone)]
pub struct Origin {
    sender: mpsc::UnboundedSender<Frame>,
}

impl Origin {
    pub fn new(sender: mpsc::UnboundedSender<Frame>) -> Self {
        Self { sender }
    }

    pub(super) fn send(&self, frame: Frame) {
        let _ = self.sender.send(frame);
    }
}

/// A way to submit commands to the engine.
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    pub(super) const fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    /// Submits an `INDEXES_UPDATE` command.
    ///
    /// Returns the command's reply stream: zero or more frames with `more`
    /// set, then the terminal ack.
    ///
    /// Panics if the engine has stopped.
    pub async fn update(&mut self, request: Request) -> mpsc::UnboundedReceiver<Frame> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.sender
            .send(Message::Update {
                request,
                origin: Origin::new(sender),
            })
            .await
            .expect("Failed to send update");
        receiver
    }

    /// Submits an `INDEXES_INTERNAL` command.
    ///
    /// Panics if the engine has stopped.
    pub async fn internal(&mut self, request: Request) -> mpsc::UnboundedReceiver<Frame> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.sender
            .send(Message::Internal {
                request,
                origin: Origin::new(sender),
            })
            .await
            .expect("Failed to send internal");
        receiver
    }

    /// Submits an `INDEXES_FIND` command.
    ///
    /// Panics if the engine has stopped.
    pub async fn find(&mut self, request: Request) -> mpsc::UnboundedReceiver<Frame> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.sender
            .send(Message::Find {
                request,
                origin: Origin::new(sender),
            })
            .await
            .expect("Failed to send find");
        receiver
    }
}
