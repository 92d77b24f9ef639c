use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

use crate::config::ResolvedConfig;
use crate::core::{PROTOCOL_PREAMBLE, PROTOCOL_VERSION};
use crate::error::VloedResult;

/// Format the announcement text clients parse to find the canvas.
///
/// The version is rendered with six decimals, which is what deployed clients expect.
pub fn announcement(server: SocketAddr, width: u32, height: u32) -> String {
    format!(
        "{PROTOCOL_PREAMBLE}:{:.6} {}:{} {width}*{height}",
        f32::from(PROTOCOL_VERSION),
        server.ip(),
        server.port(),
    )
}

/// Periodic "here is a canvas" broadcast.
pub struct DiscoveryBeacon {
    socket: UdpSocket,
    target: SocketAddr,
    message: String,
}

impl DiscoveryBeacon {
    /// Beacon for `cfg`, sent to `cfg.discover` and advertising the logical canvas size.
    pub fn new(cfg: &ResolvedConfig) -> VloedResult<Self> {
        let (w, h) = cfg.logical_size();
        Self::with_target(cfg.discover, announcement(cfg.bind, w, h))
    }

    pub fn with_target(target: SocketAddr, message: String) -> VloedResult<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;
        Ok(Self {
            socket,
            target,
            message,
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn announce(&self) -> VloedResult<()> {
        self.socket.send_to(self.message.as_bytes(), self.target)?;
        debug!(to = %self.target, "sent discovery packet");
        Ok(())
    }
}
