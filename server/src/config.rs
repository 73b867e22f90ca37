use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::{Parser, ValueEnum};

use crate::hub::{HubConfig, DEFAULT_OUTBOX_CAPACITY};
use crate::logging::LogFormat;

pub const DEFAULT_PORT: u16 = 8080;

/// How inbound frames are treated by the connection adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum RelayMode {
    /// Decode strokes, record them in history and replay them to late joiners.
    #[default]
    Stroke,
    /// Forward every frame verbatim without interpreting or storing it.
    Raw,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Real-time collaborative drawing relay")]
pub struct Config {
    #[arg(long, env = "BACKEND_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(short, long, env = "BACKEND_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Live messages buffered per client before new ones are dropped.
    #[arg(long, default_value_t = DEFAULT_OUTBOX_CAPACITY, value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize))]
    pub outbox_capacity: usize,

    /// Also send each stroke back to the client that drew it.
    #[arg(long)]
    pub echo_to_sender: bool,

    #[arg(long, value_enum, default_value_t = RelayMode::Stroke)]
    pub relay_mode: RelayMode,

    /// Directory with a built frontend to serve for unmatched paths.
    #[arg(long)]
    pub public_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            echo_to_sender: false,
            relay_mode: RelayMode::Stroke,
            public_dir: None,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            outbox_capacity: self.outbox_capacity,
            echo_to_sender: self.echo_to_sender,
        }
    }
}
