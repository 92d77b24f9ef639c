use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::discovery::DiscoveryBeacon;
use crate::error::VloedResult;
use crate::ingress::{PacketReceiver, ingress_queue};
use crate::pacer::Pacer;
use crate::sink::DisplaySink;

/// Process-wide stop flag shared by the receiver and the pacer.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A bound canvas server: receiver socket, queue, beacon and pacer, ready to run.
pub struct Server<S: DisplaySink> {
    receiver: PacketReceiver,
    pacer: Pacer<S>,
    local_addr: SocketAddr,
    shutdown: Shutdown,
}

impl<S: DisplaySink> Server<S> {
    /// Bind the ingress socket and build the pipeline. Discovery is enabled.
    pub fn bind(cfg: &ResolvedConfig, sink: S) -> VloedResult<Self> {
        let beacon = DiscoveryBeacon::new(cfg)?;
        Self::bind_with_beacon(cfg, sink, Some(beacon))
    }

    pub fn bind_with_beacon(
        cfg: &ResolvedConfig,
        sink: S,
        beacon: Option<DiscoveryBeacon>,
    ) -> VloedResult<Self> {
        let (tx, rx) = ingress_queue(cfg.queue_capacity);
        let receiver = PacketReceiver::bind(cfg.bind, tx)?;
        let local_addr = receiver.local_addr()?;
        let mut pacer = Pacer::new(cfg, rx, sink)?;
        if let Some(beacon) = beacon {
            info!(to = %beacon.target(), message = beacon.message(), "discovery enabled");
            pacer = pacer.with_beacon(beacon);
        }
        Ok(Self {
            receiver,
            pacer,
            local_addr,
            shutdown: Shutdown::new(),
        })
    }

    /// Address the ingress socket is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that stops [`Server::run`] from any thread.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run until the shutdown handle fires. The pacer runs on the calling thread.
    ///
    /// Returns the sink so callers can inspect what was presented.
    pub fn run(self) -> VloedResult<S> {
        let Self {
            receiver,
            mut pacer,
            local_addr,
            shutdown,
        } = self;

        let rx_thread = receiver.spawn(shutdown.clone())?;
        pacer.run(&shutdown);

        // The receiver wakes up at least every poll interval to see the flag.
        shutdown.trigger();
        if rx_thread.join().is_err() {
            warn!("receiver thread panicked");
        }
        info!(%local_addr, "closing server");
        Ok(pacer.into_sink())
    }
}
