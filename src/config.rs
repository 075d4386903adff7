/*!
 * Server configuration
 *
 * One immutable value, parsed from the command line at startup and passed
 * into the server constructor. Nothing reads configuration after that.
 */

use crate::{DEFAULT_HOST, DEFAULT_PORT};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};

/// Listen address for the server.
#[derive(Debug, Clone, Parser)]
#[command(name = "emberd", version, about = "In-memory Redis-compatible key-value server")]
pub struct Config {
    /// Host to listen on
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Config {
    /// Resolve the configured host and port into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))?;
        match addrs.next() {
            Some(addr) => Ok(addr),
            None => bail!("listen address {}:{} resolved to nothing", self.host, self.port),
        }
    }
}
