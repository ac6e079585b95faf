//! Raw serial-over-TCP bridge (ser2net style) transport.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, instrument};

use super::{Transport, timed_out};

/// Smallest read timeout the socket layer accepts.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Connection to a TCP port that passes bytes straight through to the bus.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    read_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Connect to the bridge at `addr`.
    #[instrument(level = "info", skip(addr))]
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            read_timeout: None,
        })
    }

    /// Connect with a bound on the connection attempt.
    pub fn connect_timeout(addr: &SocketAddr, timeout: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(addr, timeout)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            read_timeout: None,
        })
    }

    /// Address of the bridge.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        if self.read_timeout != Some(timeout) {
            self.stream.set_read_timeout(Some(timeout))?;
            self.read_timeout = Some(timeout);
        }
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8> {
        self.set_read_timeout(timeout)?;
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(1) => Ok(byte[0]),
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "bridge closed the connection",
            )),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Err(timed_out("bridge read")),
            Err(err) => Err(err),
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 256];
        let mut dropped = 0usize;
        let result = loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => break Ok(()),
                Ok(n) => dropped += n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        self.stream.set_nonblocking(false)?;
        debug!(dropped, "discarded buffered bus input");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_read_write_through_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 3];
            conn.read_exact(&mut buf).unwrap();
            conn.write_all(&[0xE0]).unwrap();
            buf
        });

        let mut transport = TcpTransport::connect(addr).unwrap();
        transport.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(transport.read_byte(Duration::from_secs(2)).unwrap(), 0xE0);
        assert_eq!(peer.join().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_silent_bridge_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut transport = TcpTransport::connect(addr).unwrap();
        let _conn = listener.accept().unwrap();

        let err = transport.read_byte(Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
