//! Process-wide refresh signal. A write in one view tells the other views
//! their copy of the client list is stale. Advisory only: events are
//! coalesced, carry no payload and are not kept across runs.

use tokio::sync::broadcast::{self, error::TryRecvError};

const BUS_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    ClientsChanged,
}

#[derive(Clone)]
pub struct RefreshBus {
    sender: broadcast::Sender<RefreshEvent>,
}

impl RefreshBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, event: RefreshEvent) {
        // No listeners yet is not an error.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> RefreshListener {
        RefreshListener {
            receiver: self.sender.subscribe(),
        }
    }

    /// Uncoalesced receiver, for counting individual events.
    #[cfg(test)]
    pub fn raw_subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.sender.subscribe()
    }
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RefreshListener {
    receiver: broadcast::Receiver<RefreshEvent>,
}

impl RefreshListener {
    /// Drains everything queued without waiting; true if anything arrived.
    pub fn pending(&mut self) -> bool {
        let mut seen = false;
        loop {
            match self.receiver.try_recv() {
                Ok(_) => seen = true,
                Err(TryRecvError::Lagged(_)) => seen = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return seen,
            }
        }
    }
}
