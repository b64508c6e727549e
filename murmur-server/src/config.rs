use clap::Parser;
use std::net::SocketAddr;

#[derive(Debug, Clone, Parser)]
#[command(name = "murmur-server", about = "Signaling coordinator for murmur peer meshes")]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    #[arg(long, env = "MURMUR_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, env = "MURMUR_LOG", default_value = "info")]
    pub log: String,

    /// Capacity of the coordinator command queue.
    #[arg(long, env = "MURMUR_QUEUE_DEPTH", default_value_t = 1024)]
    pub queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log: "info".to_owned(),
            queue_depth: 1024,
        }
    }
}
