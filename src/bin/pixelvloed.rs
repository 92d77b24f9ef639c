use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing::{info, level_filters::LevelFilter};

use pixelvloed::{
    AlphaBlend, DisplaySink, FixedResolution, NullSink, PngSnapshotSink, Server, ServerConfig,
    window_title,
};

/// UDP/binary pixel canvas server.
#[derive(Parser, Debug)]
#[command(name = "pixelvloed", version)]
struct Cli {
    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short = 'v', long)]
    debug: bool,

    /// Address to listen on (also advertised by the discovery beacon).
    #[arg(short = 'i', long = "ip")]
    ip: Option<IpAddr>,

    /// UDP port to listen on.
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Canvas width in cells (default 1366).
    #[arg(short = 'x', long)]
    width: Option<u32>,

    /// Canvas height in cells (default 786).
    #[arg(short = 'y', long)]
    height: Option<u32>,

    /// Maximum pixels decoded from one datagram.
    #[arg(short = 'm', long = "max-pixels")]
    max_pixels: Option<usize>,

    /// Cells per logical pixel along each axis.
    #[arg(short = 'f', long = "factor")]
    factor: Option<u32>,

    /// Presentation rate.
    #[arg(long)]
    fps: Option<u32>,

    /// UDP port discovery announcements are broadcast to.
    #[arg(long)]
    discover_port: Option<u16>,

    /// Datagrams buffered before new ones are dropped.
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Blend translucent pixels with alpha scaled to 0..1 instead of the raw byte.
    #[arg(long, default_value_t = false)]
    normalized_alpha: bool,

    /// Do not broadcast discovery announcements.
    #[arg(long, default_value_t = false)]
    no_discovery: bool,

    /// Present frames into this PNG file instead of running headless.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Minimum time between two PNG writes.
    #[arg(long, default_value_t = 1000)]
    snapshot_interval_ms: u64,

    /// Stop after this many seconds instead of running until killed.
    #[arg(long)]
    duration_secs: Option<u64>,
}

impl Cli {
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut cfg = match &self.config {
            Some(path) => ServerConfig::from_path(path)?,
            None => ServerConfig::default(),
        };
        cfg.debug |= self.debug;
        if let Some(ip) = self.ip {
            cfg.bind_ip = ip;
        }
        if let Some(port) = self.port {
            cfg.bind_port = port;
        }
        if self.width.is_some() {
            cfg.width = self.width;
        }
        if self.height.is_some() {
            cfg.height = self.height;
        }
        if let Some(m) = self.max_pixels {
            cfg.max_pixels_per_packet = m;
        }
        if let Some(f) = self.factor {
            cfg.scale = f;
        }
        if let Some(fps) = self.fps {
            cfg.target_fps = fps;
        }
        if let Some(port) = self.discover_port {
            cfg.discover_port = port;
        }
        if let Some(cap) = self.queue_capacity {
            cfg.queue_capacity = cap;
        }
        if self.normalized_alpha {
            cfg.alpha_blend = AlphaBlend::Normalized;
        }
        Ok(cfg)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.server_config()?;

    tracing_subscriber::fmt()
        .with_max_level(if cfg.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let resolved = cfg
        .resolve(&FixedResolution::default())
        .context("invalid configuration")?;

    let sink: Box<dyn DisplaySink> = match &cli.snapshot {
        Some(path) => Box::new(PngSnapshotSink::new(
            path,
            Duration::from_millis(cli.snapshot_interval_ms),
        )),
        None => Box::new(NullSink::new()),
    };

    let server = if cli.no_discovery {
        Server::bind_with_beacon(&resolved, sink, None)
    } else {
        Server::bind(&resolved, sink)
    }
    .with_context(|| format!("bind {}", resolved.bind))?;

    info!(
        title = %window_title(Some(&server.local_addr().to_string())),
        width = resolved.width,
        height = resolved.height,
        scale = resolved.scale,
        fps = resolved.target_fps,
        "canvas ready"
    );

    if let Some(secs) = cli.duration_secs {
        let shutdown = server.shutdown_handle();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            shutdown.trigger();
        });
    }

    server.run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_flags_match_classic_options() {
        let cli = Cli::try_parse_from([
            "pixelvloed", "-v", "-i", "0.0.0.0", "-p", "6000", "-x", "800", "-y", "600", "-m",
            "50", "-f", "2",
        ])
        .unwrap();
        let cfg = cli.server_config().unwrap();
        assert!(cfg.debug);
        assert_eq!(cfg.bind_ip.to_string(), "0.0.0.0");
        assert_eq!(cfg.bind_port, 6000);
        assert_eq!((cfg.width, cfg.height), (Some(800), Some(600)));
        assert_eq!(cfg.max_pixels_per_packet, 50);
        assert_eq!(cfg.scale, 2);
    }

    #[test]
    fn unset_flags_keep_defaults() {
        let cli = Cli::try_parse_from(["pixelvloed"]).unwrap();
        assert_eq!(cli.server_config().unwrap(), ServerConfig::default());
    }
}
