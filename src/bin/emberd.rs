/*!
 * emberd server entry point
 *
 * Initializes logging, parses the listen address from the command line,
 * binds the listening socket and hands control to the server loop.
 */

use anyhow::Result;
use clap::Parser;
use emberdb::{Config, Server, Store};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    // Respects RUST_LOG, e.g. RUST_LOG=debug emberd --port 7379
    env_logger::init();

    let config = Config::parse();

    // A failed bind is the one unrecoverable error: bubble it out of main.
    let server = Server::bind(&config)?;
    println!("emberd running on {}", server.local_addr());

    server.run(Arc::new(Store::new()))
}
