use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;

use crate::error::{VloedError, VloedResult};
use crate::framebuffer::AlphaBlend;

pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_BIND_PORT: u16 = 5005;
pub const DEFAULT_DISCOVER_PORT: u16 = 5006;
pub const DEFAULT_WIDTH: u32 = 1366;
pub const DEFAULT_HEIGHT: u32 = 786;
pub const DEFAULT_MAX_PIXELS: usize = 140;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
pub const DEFAULT_BEACON_INTERVAL_MS: u64 = 2000;

/// Supplies the canvas size when the operator did not pick one.
pub trait ResolutionProvider {
    fn resolution(&self) -> (u32, u32);
}

/// Provider returning a fixed size; the default is 1366×786.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedResolution {
    pub width: u32,
    pub height: u32,
}

impl Default for FixedResolution {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl ResolutionProvider for FixedResolution {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Operator-facing server options, as read from JSON and/or the command line.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Verbose logging.
    pub debug: bool,
    pub bind_ip: IpAddr,
    pub bind_port: u16,
    pub discover_port: u16,
    /// Destination address of discovery broadcasts.
    pub broadcast_ip: IpAddr,
    /// Display surface width in cells; `None` asks the [`ResolutionProvider`].
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_pixels_per_packet: usize,
    /// Cells per logical pixel along each axis.
    pub scale: u32,
    pub target_fps: u32,
    /// Datagrams buffered between the receiver and the pacer before new ones are dropped.
    pub queue_capacity: usize,
    pub beacon_interval_ms: u64,
    pub alpha_blend: AlphaBlend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            bind_ip: DEFAULT_BIND_IP,
            bind_port: DEFAULT_BIND_PORT,
            discover_port: DEFAULT_DISCOVER_PORT,
            broadcast_ip: IpAddr::V4(Ipv4Addr::BROADCAST),
            width: None,
            height: None,
            max_pixels_per_packet: DEFAULT_MAX_PIXELS,
            scale: 1,
            target_fps: DEFAULT_FPS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            beacon_interval_ms: DEFAULT_BEACON_INTERVAL_MS,
            alpha_blend: AlphaBlend::Literal,
        }
    }
}

impl ServerConfig {
    pub fn from_path(path: impl AsRef<Path>) -> VloedResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config JSON '{}'", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> VloedResult<()> {
        if self.scale == 0 {
            return Err(VloedError::validation("scale must be >= 1"));
        }
        if self.target_fps == 0 {
            return Err(VloedError::validation("target_fps must be >= 1"));
        }
        if self.max_pixels_per_packet == 0 {
            return Err(VloedError::validation("max_pixels_per_packet must be >= 1"));
        }
        if self.queue_capacity == 0 {
            return Err(VloedError::validation("queue_capacity must be >= 1"));
        }
        if self.beacon_interval_ms == 0 {
            return Err(VloedError::validation("beacon_interval_ms must be >= 1"));
        }
        for (name, v) in [("width", self.width), ("height", self.height)] {
            match v {
                Some(0) => {
                    return Err(VloedError::validation(format!("{name} must be non-zero")));
                }
                Some(v) if v < self.scale => {
                    return Err(VloedError::validation(format!(
                        "{name} ({v}) is smaller than scale ({})",
                        self.scale
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate and freeze into the snapshot every component reads.
    pub fn resolve(&self, provider: &dyn ResolutionProvider) -> VloedResult<ResolvedConfig> {
        let (default_w, default_h) = provider.resolution();
        let resolved = Self {
            width: Some(self.width.unwrap_or(default_w)),
            height: Some(self.height.unwrap_or(default_h)),
            ..self.clone()
        };
        resolved.validate()?;

        Ok(ResolvedConfig {
            debug: self.debug,
            bind: SocketAddr::new(self.bind_ip, self.bind_port),
            discover: SocketAddr::new(self.broadcast_ip, self.discover_port),
            width: resolved.width.unwrap_or(default_w),
            height: resolved.height.unwrap_or(default_h),
            scale: self.scale,
            max_pixels_per_packet: self.max_pixels_per_packet,
            target_fps: self.target_fps,
            queue_capacity: self.queue_capacity,
            beacon_interval: Duration::from_millis(self.beacon_interval_ms),
            alpha_blend: self.alpha_blend,
        })
    }
}

/// Immutable runtime configuration with the canvas size filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    pub debug: bool,
    pub bind: SocketAddr,
    /// Where discovery announcements are sent.
    pub discover: SocketAddr,
    /// Display surface size in cells.
    pub width: u32,
    pub height: u32,
    pub scale: u32,
    pub max_pixels_per_packet: usize,
    pub target_fps: u32,
    pub queue_capacity: usize,
    pub beacon_interval: Duration,
    pub alpha_blend: AlphaBlend,
}

impl ResolvedConfig {
    /// Size clients address, i.e. the surface divided by the scale factor.
    pub fn logical_size(&self) -> (u32, u32) {
        (self.width / self.scale, self.height / self.scale)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_conventions() {
        let cfg = ServerConfig::default().resolve(&FixedResolution::default()).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:5005".parse().unwrap());
        assert_eq!(cfg.discover, "255.255.255.255:5006".parse().unwrap());
        assert_eq!((cfg.width, cfg.height), (1366, 786));
        assert_eq!(cfg.max_pixels_per_packet, 140);
        assert_eq!(cfg.scale, 1);
        assert_eq!(cfg.target_fps, 30);
        assert_eq!(cfg.beacon_interval, Duration::from_secs(2));
        assert_eq!(cfg.alpha_blend, AlphaBlend::Literal);
    }

    #[test]
    fn explicit_size_wins_over_provider() {
        let cfg = ServerConfig {
            width: Some(640),
            ..ServerConfig::default()
        };
        let r = cfg
            .resolve(&FixedResolution {
                width: 100,
                height: 50,
            })
            .unwrap();
        assert_eq!((r.width, r.height), (640, 50));
    }

    #[test]
    fn logical_size_divides_by_scale() {
        let cfg = ServerConfig {
            width: Some(1366),
            height: Some(786),
            scale: 4,
            ..ServerConfig::default()
        };
        let r = cfg.resolve(&FixedResolution::default()).unwrap();
        assert_eq!(r.logical_size(), (341, 196));
    }

    #[test]
    fn frame_period_follows_fps() {
        let r = ServerConfig {
            target_fps: 50,
            ..ServerConfig::default()
        }
        .resolve(&FixedResolution::default())
        .unwrap();
        assert_eq!(r.frame_period(), Duration::from_millis(20));
    }

    #[test]
    fn validate_rejects_zeroes() {
        for cfg in [
            ServerConfig {
                scale: 0,
                ..ServerConfig::default()
            },
            ServerConfig {
                target_fps: 0,
                ..ServerConfig::default()
            },
            ServerConfig {
                max_pixels_per_packet: 0,
                ..ServerConfig::default()
            },
            ServerConfig {
                queue_capacity: 0,
                ..ServerConfig::default()
            },
            ServerConfig {
                width: Some(0),
                ..ServerConfig::default()
            },
        ] {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn provider_size_smaller_than_scale_is_rejected() {
        let cfg = ServerConfig {
            scale: 8,
            ..ServerConfig::default()
        };
        let err = cfg
            .resolve(&FixedResolution {
                width: 4,
                height: 4,
            })
            .unwrap_err();
        assert!(err.to_string().contains("smaller than scale"));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let cfg: ServerConfig =
            serde_json::from_str(r#"{ "bind_port": 7000, "scale": 2, "alpha_blend": "normalized" }"#)
                .unwrap();
        assert_eq!(cfg.bind_port, 7000);
        assert_eq!(cfg.scale, 2);
        assert_eq!(cfg.alpha_blend, AlphaBlend::Normalized);
        assert_eq!(cfg.max_pixels_per_packet, DEFAULT_MAX_PIXELS);
    }

    #[test]
    fn json_rejects_unknown_fields() {
        assert!(serde_json::from_str::<ServerConfig>(r#"{ "colour": 1 }"#).is_err());
    }
}
