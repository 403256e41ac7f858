//! Datagram transports beneath the replication channel
//!
//! The channel only needs "send one datagram to every replica" and
//! "non-blocking receive of one datagram". Ordering and delivery are not
//! assumed.

use std::io;
use std::sync::{Arc, Mutex};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

/// Unreliable datagram transport
pub trait StateTransport {
    /// Send one datagram to every subscriber
    fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Receive one pending datagram into `buf` without blocking
    ///
    /// Returns the datagram length, or `None` if nothing is pending.
    /// Datagrams longer than `buf` are truncated.
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

type Subscribers = Arc<Mutex<Vec<Sender<Vec<u8>>>>>;

/// In-process fan-out bus: one publisher, any number of subscribers
///
/// Used by tests and for running primary and replicas in one process.
#[derive(Debug, Clone, Default)]
pub struct LoopbackBus {
    subscribers: Subscribers,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sending end
    pub fn publisher(&self) -> LoopbackPublisher {
        LoopbackPublisher {
            subscribers: self.subscribers.clone(),
        }
    }

    /// New receiving end; only sees datagrams sent after it subscribed
    pub fn subscribe(&self) -> LoopbackSubscriber {
        let (tx, rx) = channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        LoopbackSubscriber { rx }
    }
}

/// Sending end of a [`LoopbackBus`]
#[derive(Debug)]
pub struct LoopbackPublisher {
    subscribers: Subscribers,
}

impl StateTransport for LoopbackPublisher {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        // Dropped subscribers disconnect; forget them
        subscribers.retain(|tx| tx.send(datagram.to_vec()).is_ok());
        Ok(())
    }

    fn try_recv(&mut self, _buf: &mut [u8]) -> io::Result<Option<usize>> {
        Ok(None)
    }
}

/// Receiving end of a [`LoopbackBus`]
#[derive(Debug)]
pub struct LoopbackSubscriber {
    rx: Receiver<Vec<u8>>,
}

impl LoopbackSubscriber {
    /// Datagrams waiting to be received
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl StateTransport for LoopbackSubscriber {
    fn send(&mut self, _datagram: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "loopback subscribers are receive-only",
        ))
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.rx.try_recv() {
            Ok(datagram) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(Some(n))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "loopback bus closed",
            )),
        }
    }
}
