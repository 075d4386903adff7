/*!
 * Connection multiplexer
 *
 * Wraps the kernel readiness facility (mio `Poll`) behind a single-owner
 * interface. Exactly one thread drives [`Poller::wait`]; other threads
 * queue freshly accepted sockets through a [`Registrar`]. Queued
 * registrations are the pending change list: they are applied to the
 * kernel facility at the start of the next wait call, and a waker forces
 * a parked wait to return so a new connection is never stranded.
 *
 * Exclusive ownership is the concurrency discipline here: every mutating
 * operation takes `&mut self`, so registration, readiness waits and
 * removal can never race on the shared connection set.
 */

use crate::connection::Connection;
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use mio::{Events, Interest, Poll, Token, Waker};
use slab::Slab;
use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

/// Token reserved for the cross-thread waker. Connection tokens are slab
/// keys, so they can never collide with it.
const WAKER_TOKEN: Token = Token(usize::MAX);

/// Readiness multiplexer over the kernel poll facility.
///
/// Owns the registered connection set exclusively: a token maps to a live
/// connection from the moment its queued registration is flushed until
/// [`Poller::remove`] drops it.
pub struct Poller {
    poll: Poll,
    events: Events,
    conns: Slab<Connection>,
    pending: Receiver<TcpStream>,
}

/// Queues connections for registration with a [`Poller`] from other
/// threads. Cloneable and cheap; the acceptor holds one.
#[derive(Clone)]
pub struct Registrar {
    tx: Sender<TcpStream>,
    waker: Arc<Waker>,
}

impl Registrar {
    /// Hand a freshly accepted socket to the poller.
    ///
    /// The socket is switched to non-blocking mode, queued on the pending
    /// change list and the wait loop is woken to pick it up.
    pub fn add(&self, stream: TcpStream) -> io::Result<()> {
        stream.set_nonblocking(true)?;
        self.tx
            .send(stream)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "poller is gone"))?;
        self.waker.wake()
    }
}

impl Poller {
    /// Create the kernel poll handle and the registration queue feeding it.
    ///
    /// `capacity` bounds how many kernel events a single wait call can
    /// deliver, not how many connections may register.
    pub fn new(capacity: usize) -> io::Result<(Poller, Registrar)> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let (tx, rx) = unbounded();
        let poller = Poller {
            poll,
            events: Events::with_capacity(capacity),
            conns: Slab::new(),
            pending: rx,
        };
        Ok((poller, Registrar { tx, waker }))
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Apply queued registrations, then block until at least one
    /// registered connection is ready or `timeout` expires.
    ///
    /// Waker traffic is internal and never surfaces in the result.
    /// Interrupted waits are retried; other kernel errors go to the
    /// caller, whose policy is to log and wait again.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Token>> {
        self.flush_pending();
        loop {
            match self.poll.poll(&mut self.events, timeout) {
                Ok(()) => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        // Registrations that arrived while parked get applied now so the
        // next wait reports their readiness.
        self.flush_pending();

        let mut ready = Vec::new();
        for event in self.events.iter() {
            let token = event.token();
            if token != WAKER_TOKEN && self.conns.contains(token.0) {
                ready.push(token);
            }
        }
        Ok(ready)
    }

    /// Access a registered connection.
    pub fn connection(&mut self, token: Token) -> Option<&mut Connection> {
        self.conns.get_mut(token.0)
    }

    /// Re-register a connection for read-only or read+write interest,
    /// depending on whether it still has unflushed reply bytes.
    pub fn update_interest(&mut self, token: Token) -> io::Result<()> {
        let Some(conn) = self.conns.get_mut(token.0) else {
            return Ok(());
        };
        let interest = if conn.wants_write() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        self.poll
            .registry()
            .reregister(conn.stream_mut(), token, interest)
    }

    /// Drop a connection: unregister the descriptor and remove its entry.
    ///
    /// The socket closes when the entry drops. Removing an absent token is
    /// a no-op, so each connection is closed at most once.
    pub fn remove(&mut self, token: Token) {
        if let Some(mut conn) = self.conns.try_remove(token.0) {
            if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
                debug!("deregister of {:?} failed: {}", token, e);
            }
        }
    }

    /// Tear the poller down, optionally shutting down every registered
    /// connection first. Consuming `self` discards the connection set and
    /// releases the kernel facility handle.
    pub fn close(mut self, close_conns: bool) {
        for conn in self.conns.drain() {
            if close_conns {
                conn.shutdown();
            }
        }
    }

    fn flush_pending(&mut self) {
        while let Ok(stream) = self.pending.try_recv() {
            if let Err(e) = self.register(stream) {
                warn!("failed to register connection: {}", e);
            }
        }
    }

    fn register(&mut self, stream: TcpStream) -> io::Result<()> {
        let addr = stream.peer_addr()?;
        let mut stream = mio::net::TcpStream::from_std(stream);
        stream.set_nodelay(true).ok();
        let entry = self.conns.vacant_entry();
        let token = Token(entry.key());
        self.poll
            .registry()
            .register(&mut stream, token, Interest::READABLE)?;
        entry.insert(Connection::new(stream, addr));
        debug!("registered {} as {:?}", addr, token);
        Ok(())
    }
}
