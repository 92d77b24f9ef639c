//! Frame pacing: drain queued datagrams into the frame buffer, present, announce.
//!
//! Every tick gets one frame period. The queue is drained until it is empty or the period is
//! used up, so a flood of packets delays presentation by at most one period instead of starving
//! it. The frame is presented only when something was drained, and the remainder of the period
//! is slept away.

use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::config::ResolvedConfig;
use crate::core::MAX_PROTOCOL_VERSION;
use crate::discovery::DiscoveryBeacon;
use crate::error::VloedResult;
use crate::framebuffer::FrameBuffer;
use crate::ingress::IngressReceiver;
use crate::protocol;
use crate::server::Shutdown;
use crate::sink::DisplaySink;

/// What one [`Pacer::tick`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Datagrams taken off the queue, malformed ones included.
    pub datagrams: usize,
    /// Pixel records applied to the frame buffer, out-of-range ones included.
    pub pixels: usize,
    pub malformed: usize,
    pub presented: bool,
    pub announced: bool,
}

/// The render loop. Sole owner of the frame buffer.
pub struct Pacer<S: DisplaySink> {
    frame: FrameBuffer,
    queue: IngressReceiver,
    sink: S,
    beacon: Option<DiscoveryBeacon>,
    max_pixels: usize,
    period: Duration,
    beacon_interval: Duration,
    last_beacon: Instant,
    presents: u64,
}

impl<S: DisplaySink> Pacer<S> {
    pub fn new(cfg: &ResolvedConfig, queue: IngressReceiver, sink: S) -> VloedResult<Self> {
        let (w, h) = cfg.logical_size();
        let frame = FrameBuffer::new(w, h, cfg.scale)?.with_blend(cfg.alpha_blend);
        Ok(Self {
            frame,
            queue,
            sink,
            beacon: None,
            max_pixels: cfg.max_pixels_per_packet,
            period: cfg.frame_period(),
            beacon_interval: cfg.beacon_interval,
            last_beacon: Instant::now(),
            presents: 0,
        })
    }

    pub fn with_beacon(mut self, beacon: DiscoveryBeacon) -> Self {
        self.beacon = Some(beacon);
        self
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Frames handed to the sink so far.
    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Apply queued datagrams until the queue is empty or `deadline` passes.
    ///
    /// Always takes at least one datagram when one is queued.
    pub fn drain(&mut self, deadline: Instant) -> TickReport {
        let mut report = TickReport::default();
        while let Some(data) = self.queue.try_pop() {
            report.datagrams += 1;
            match protocol::decode(&data, self.max_pixels) {
                Ok(records) => {
                    if records.header().version > MAX_PROTOCOL_VERSION {
                        trace!(
                            version = records.header().version,
                            "newer protocol version, decoding as v{MAX_PROTOCOL_VERSION}"
                        );
                    }
                    debug!(
                        pixels = records.len(),
                        protocol = records.header().version,
                        "{} pixels received, protocol V {}",
                        records.len(),
                        records.header().version
                    );
                    for p in records {
                        trace!(?p, "pixel");
                        self.frame.apply(p);
                        report.pixels += 1;
                    }
                }
                Err(e) => {
                    report.malformed += 1;
                    debug!(error = %e, "dropping datagram");
                }
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        report
    }

    /// One iteration: drain for up to one period, announce when due, present when changed.
    pub fn tick(&mut self) -> TickReport {
        let start = Instant::now();
        let mut report = self.drain(start + self.period);

        if self.last_beacon.elapsed() > self.beacon_interval {
            self.last_beacon = Instant::now();
            report.announced = self.announce();
        }

        if report.datagrams > 0 {
            report.presented = self.present();
        }
        report
    }

    /// Tick until `shutdown` fires, sleeping out the rest of each period.
    #[tracing::instrument(skip_all, name = "pacer")]
    pub fn run(&mut self, shutdown: &Shutdown) {
        info!(
            width = self.frame.width(),
            height = self.frame.height(),
            scale = self.frame.scale(),
            period_ms = self.period.as_millis() as u64,
            "pacer started"
        );
        while !shutdown.is_triggered() {
            let start = Instant::now();
            self.tick();
            if let Some(rest) = self.period.checked_sub(start.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        info!(
            presents = self.presents,
            received = self.queue.stats().received(),
            dropped = self.queue.stats().dropped(),
            "pacer stopped"
        );
    }

    fn announce(&self) -> bool {
        let Some(beacon) = &self.beacon else {
            return false;
        };
        match beacon.announce() {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "discovery broadcast failed");
                false
            }
        }
    }

    fn present(&mut self) -> bool {
        match self.sink.present(self.frame.view()) {
            Ok(()) => {
                self.presents += 1;
                true
            }
            Err(e) => {
                warn!(error = %e, "present failed");
                false
            }
        }
    }
}
