//! PixelVloed is a real-time, multi-writer pixel canvas.
//!
//! Clients stream pixel records over UDP; the server decodes them into a shared frame buffer and
//! presents it to a display sink at a fixed frame rate, while broadcasting a discovery beacon so
//! clients can find the canvas:
//!
//! - [`PacketReceiver`] queues raw datagrams
//! - [`Pacer`] decodes them ([`protocol::decode`]) into a [`FrameBuffer`] and presents through a
//!   [`DisplaySink`]
//! - [`DiscoveryBeacon`] announces address and resolution
#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod discovery;
pub mod error;
pub mod framebuffer;
pub mod ingress;
pub mod pacer;
pub mod protocol;
pub mod server;
pub mod sink;

pub use crate::config::{FixedResolution, ResolutionProvider, ResolvedConfig, ServerConfig};
pub use crate::core::{PROTOCOL_VERSION, PixelUpdate, pack_rgb, unpack_rgb};
pub use crate::discovery::{DiscoveryBeacon, announcement};
pub use crate::error::{VloedError, VloedResult};
pub use crate::framebuffer::{AlphaBlend, FrameBuffer, FrameView};
pub use crate::ingress::{Datagram, IngressReceiver, IngressSender, PacketReceiver, ingress_queue};
pub use crate::pacer::{Pacer, TickReport};
pub use crate::server::{Server, Shutdown};
pub use crate::sink::{
    DisplaySink, InMemorySink, NullSink, PngSnapshotSink, PresentedFrame, window_title,
};
