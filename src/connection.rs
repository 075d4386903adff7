/*!
 * Per-connection state
 *
 * Each registered connection owns its socket plus two buffers: a growable
 * read buffer that accumulates bytes until complete requests can be carved
 * off, and a write buffer holding reply bytes the kernel has not yet
 * accepted. Sockets are non-blocking; a single read call is bounded by
 * [`READ_CHUNK`] but a request may span any number of reads.
 */

use bytes::{Buf, BytesMut};
use mio::net::TcpStream;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

/// Bytes pulled off the socket in a single read call.
pub const READ_CHUNK: usize = 512;

/// Outcome of draining a readable socket.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Socket drained; the read buffer may now hold complete requests.
    Ready,
    /// Peer closed its end of the stream.
    Eof,
}

pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    rbuf: BytesMut,
    wbuf: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Connection {
        Connection {
            stream,
            addr,
            rbuf: BytesMut::with_capacity(READ_CHUNK),
            wbuf: BytesMut::new(),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Read whatever the socket has, in [`READ_CHUNK`]-sized calls,
    /// appending to the read buffer until the kernel would block.
    pub fn fill(&mut self) -> io::Result<ReadOutcome> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(ReadOutcome::Eof),
                Ok(n) => self.rbuf.extend_from_slice(&chunk[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadOutcome::Ready)
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Buffered input not yet parsed into requests.
    pub fn read_buffer(&self) -> &[u8] {
        &self.rbuf
    }

    /// Discard `n` parsed bytes from the front of the read buffer.
    pub fn consume(&mut self, n: usize) {
        self.rbuf.advance(n);
    }

    /// Reply bytes queue here before [`flush`](Connection::flush) pushes
    /// them to the socket.
    pub fn write_buffer(&mut self) -> &mut BytesMut {
        &mut self.wbuf
    }

    /// Push buffered reply bytes to the socket until done or the kernel
    /// would block; whatever remains stays queued.
    pub fn flush(&mut self) -> io::Result<()> {
        while !self.wbuf.is_empty() {
            match self.stream.write(&self.wbuf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.wbuf.advance(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// True while replies are still queued for the kernel.
    pub fn wants_write(&self) -> bool {
        !self.wbuf.is_empty()
    }

    pub(crate) fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
