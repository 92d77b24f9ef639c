//! Network ingress: the UDP receive thread and the queue it feeds.
//!
//! The queue is a bounded `sync_channel`. The receiver never blocks on it: when the pacer falls
//! behind and the queue is full, the newly received datagram is dropped and counted.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::error::VloedResult;
use crate::server::Shutdown;

/// Largest UDP payload we accept.
const MAX_DATAGRAM_SIZE: usize = 65535;
/// How often a blocked receive wakes up to look at the shutdown flag.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw payload of one received packet.
pub type Datagram = Vec<u8>;

/// Counters shared by both ends of the queue.
#[derive(Debug, Default)]
pub struct IngressStats {
    received: AtomicU64,
    dropped: AtomicU64,
}

impl IngressStats {
    /// Datagrams accepted into the queue.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Datagrams discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue full; the datagram was discarded.
    Dropped,
    /// The consumer is gone.
    Closed,
}

/// Create the hand-off between the receive thread and the pacer.
pub fn ingress_queue(capacity: usize) -> (IngressSender, IngressReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    let stats = Arc::new(IngressStats::default());
    (
        IngressSender {
            tx,
            stats: Arc::clone(&stats),
        },
        IngressReceiver { rx, stats },
    )
}

/// Producer end, owned by the [`PacketReceiver`].
#[derive(Clone, Debug)]
pub struct IngressSender {
    tx: SyncSender<Datagram>,
    stats: Arc<IngressStats>,
}

impl IngressSender {
    pub fn push(&self, datagram: Datagram) -> PushOutcome {
        match self.tx.try_send(datagram) {
            Ok(()) => {
                self.stats.received.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Queued
            }
            Err(TrySendError::Full(d)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(len = d.len(), "ingress queue full, dropping datagram");
                PushOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => PushOutcome::Closed,
        }
    }

    pub fn stats(&self) -> &IngressStats {
        &self.stats
    }
}

/// Consumer end, owned by the pacer.
#[derive(Debug)]
pub struct IngressReceiver {
    rx: Receiver<Datagram>,
    stats: Arc<IngressStats>,
}

impl IngressReceiver {
    /// Next datagram without waiting; `None` when the queue is empty or closed.
    pub fn try_pop(&self) -> Option<Datagram> {
        match self.rx.try_recv() {
            Ok(d) => Some(d),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn stats(&self) -> &IngressStats {
        &self.stats
    }
}

/// Receives datagrams on the canvas port and queues them untouched.
pub struct PacketReceiver {
    socket: UdpSocket,
    queue: IngressSender,
    buf: Vec<u8>,
}

impl PacketReceiver {
    pub fn bind(addr: SocketAddr, queue: IngressSender) -> VloedResult<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
        Ok(Self {
            socket,
            queue,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn local_addr(&self) -> VloedResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until `shutdown` fires or the pacer drops its end of the queue.
    pub fn run(&mut self, shutdown: &Shutdown) {
        while !shutdown.is_triggered() {
            let (n, from) = match self.socket.recv_from(&mut self.buf) {
                Ok(ok) => ok,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "udp receive failed");
                    continue;
                }
            };
            trace!(%from, len = n, "datagram received");
            if self.queue.push(self.buf[..n].to_vec()) == PushOutcome::Closed {
                debug!("ingress queue closed, receiver exiting");
                return;
            }
        }
    }

    /// Run on a dedicated thread.
    pub fn spawn(mut self, shutdown: Shutdown) -> VloedResult<JoinHandle<()>> {
        let addr = self.local_addr()?;
        let handle = std::thread::Builder::new()
            .name("pixelvloed-rx".to_string())
            .spawn(move || {
                info!(%addr, "listening for pixel datagrams");
                self.run(&shutdown);
                debug!("receiver stopped");
            })?;
        Ok(handle)
    }
}
