/*!
 * TCP server and event loop
 *
 * The server owns the listening socket. A dedicated acceptor thread
 * performs blocking accepts and queues each new connection with the
 * poller; the event-loop thread is the poller's single owner and drives
 * one read, decode, evaluate, encode, write cycle per ready connection.
 * Per-connection failures tear that connection down and never touch the
 * accept loop or the process.
 */

use crate::command::Command;
use crate::config::Config;
use crate::connection::{Connection, ReadOutcome};
use crate::poller::{Poller, Registrar};
use crate::protocol::{self, DecodeError};
use crate::store::Store;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use mio::Token;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

/// Kernel event batch size for a single wait call.
const EVENT_CAPACITY: usize = 1024;

/// Listen backlog for the server socket.
const BACKLOG: i32 = 1024;

/// Why the event loop stopped servicing a connection.
enum Teardown {
    Eof,
    Read(io::Error),
    Write(io::Error),
    Protocol(DecodeError),
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the listening socket for `config`.
    ///
    /// Failure here is an unrecoverable startup error; the binary exits
    /// with it.
    pub fn bind(config: &Config) -> Result<Server> {
        let addr = config.socket_addr()?;
        let listener =
            bind_listener(addr).with_context(|| format!("failed to bind {}", addr))?;
        let local_addr = listener.local_addr()?;
        Ok(Server {
            listener,
            local_addr,
        })
    }

    /// Address the server is actually listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop and the event loop.
    ///
    /// Spawns the acceptor thread, then turns the calling thread into the
    /// event loop. Does not return under normal operation; shutdown is
    /// external.
    pub fn run(self, store: Arc<Store>) -> Result<()> {
        let (mut poller, registrar) = Poller::new(EVENT_CAPACITY)?;
        info!("listening on {}", self.local_addr);

        let listener = self.listener;
        thread::Builder::new()
            .name("acceptor".into())
            .spawn(move || accept_loop(listener, registrar))?;

        event_loop(&mut poller, store.as_ref())
    }
}

/// Bind with reuse-address so quick restarts do not trip over TIME_WAIT.
fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    Ok(socket.into())
}

/// Blocking accept loop.
///
/// Every accepted socket is queued with the poller. Accept errors are
/// logged and the loop keeps going; only a vanished poller stops it.
fn accept_loop(listener: TcpListener, registrar: Registrar) {
    let mut clients: u64 = 0;
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                clients += 1;
                info!("client {} connected from {}", clients, addr);
                if let Err(e) = registrar.add(stream) {
                    warn!("could not register {}: {}", addr, e);
                    if e.kind() == io::ErrorKind::BrokenPipe {
                        error!("registration queue closed, stopping acceptor");
                        break;
                    }
                }
            }
            Err(e) => warn!("accept failed: {}", e),
        }
    }
}

/// The single wait loop owning the kernel facility.
///
/// Wait errors are logged and retried, never fatal; per-connection
/// failures remove that connection only.
fn event_loop(poller: &mut Poller, store: &Store) -> Result<()> {
    loop {
        let ready = match poller.wait(None) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("poll wait failed, retrying: {}", e);
                continue;
            }
        };
        for token in ready {
            service(poller, token, store);
        }
    }
}

/// Service one ready connection, tearing it down on transport or protocol
/// failure.
fn service(poller: &mut Poller, token: Token, store: &Store) {
    let (addr, result) = match poller.connection(token) {
        Some(conn) => (conn.peer_addr(), drive(conn, store)),
        None => return,
    };
    match result {
        Ok(()) => {
            if let Err(e) = poller.update_interest(token) {
                warn!("lost track of {}: {}", addr, e);
                poller.remove(token);
            }
        }
        Err(cause) => {
            match cause {
                Teardown::Eof => info!("client {} disconnected", addr),
                Teardown::Read(e) => warn!("read error on {}: {}", addr, e),
                Teardown::Write(e) => warn!("write error on {}: {}", addr, e),
                Teardown::Protocol(e) => {
                    warn!("protocol error on {}: {}, dropping connection", addr, e)
                }
            }
            poller.remove(token);
        }
    }
}

/// One read, decode, evaluate, encode, write cycle.
fn drive(conn: &mut Connection, store: &Store) -> Result<(), Teardown> {
    if conn.fill().map_err(Teardown::Read)? == ReadOutcome::Eof {
        return Err(Teardown::Eof);
    }
    respond(conn, store).map_err(Teardown::Protocol)?;
    conn.flush().map_err(Teardown::Write)?;
    Ok(())
}

/// Decode every complete request buffered on the connection, evaluate each
/// in arrival order and queue the replies. Pipelined requests are answered
/// back-to-back in one pass.
fn respond(conn: &mut Connection, store: &Store) -> Result<(), DecodeError> {
    loop {
        let Some((tokens, consumed)) = protocol::parse_request(conn.read_buffer())? else {
            return Ok(());
        };
        conn.consume(consumed);
        let Some(command) = Command::from_tokens(tokens) else {
            // An empty array carries no command and gets no reply.
            continue;
        };
        debug!("request: {} ({} args)", command.name, command.args.len());
        match command.eval(store) {
            Ok(value) => {
                if protocol::encode(&value, conn.write_buffer()).is_err() {
                    // Unreachable with current verbs; answered rather than
                    // crashed so a future verb cannot take the server down.
                    protocol::write_error("ERR unsupported reply type", conn.write_buffer());
                }
            }
            Err(e) => protocol::write_error(&e.to_string(), conn.write_buffer()),
        }
    }
}
