// Core modules for the emberdb key-value server
pub mod command; // Command model + dispatch (PING today, data verbs later)
pub mod config; // immutable {host, port} startup configuration
pub mod connection; // per-connection socket + read/write buffers
pub mod net; // listener, acceptor thread and the event loop
pub mod poller; // readiness multiplexer over the kernel poll facility
pub mod protocol; // RESP parser + encoders
pub mod store; // shared handle future data verbs receive

pub use command::{Command, CommandError};
pub use config::Config;
pub use connection::Connection;
pub use net::Server;
pub use poller::{Poller, Registrar};
pub use protocol::{DecodeError, Value};
pub use store::Store;

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port. 7379 keeps clear of a locally running Redis.
pub const DEFAULT_PORT: u16 = 7379;
