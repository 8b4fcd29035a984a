use std::io::{self, Read, Write};
use std::net::SocketAddr;

use crate::error::{NetError, NetResult};
use crate::socket::SocketHandle;

/// An immutable `(ip, port)` pair, captured once at `Connection`
/// construction time for logging and introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAndPort {
    pub ip: String,
    pub port: u16,
}

impl IpAndPort {
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        IpAndPort { ip: addr.ip().to_string(), port: addr.port() }
    }
}

impl std::fmt::Display for IpAndPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Controls how far [`Connection::blocking_read`] goes before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingReadPolicy {
    /// Return as soon as at least one byte has been read.
    ReturnAsap,
    /// Loop until the destination buffer is completely filled (or the
    /// connection closes / errors).
    FillFullBuffer,
}

/// A connected stream: a [`SocketHandle`] plus the local and remote
/// endpoints captured at construction time.
#[derive(Debug)]
pub struct Connection {
    handle: SocketHandle,
    local: IpAndPort,
    remote: IpAndPort,
}

impl Connection {
    pub fn new(handle: SocketHandle, local: IpAndPort, remote: IpAndPort) -> Self {
        Connection { handle, local, remote }
    }

    pub fn local_ip_and_port(&self) -> &IpAndPort {
        &self.local
    }

    pub fn remote_ip_and_port(&self) -> &IpAndPort {
        &self.remote
    }

    /// Bound how long a single `blocking_read` call may block. `None`
    /// waits indefinitely, matching the "no request-level timeout" default.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> NetResult<()> {
        self.handle.set_read_timeout(timeout)
    }

    fn read_once(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle.try_raw().map_err(to_io_error)?.read(buf)
    }

    fn write_once(&self, buf: &[u8]) -> io::Result<usize> {
        self.handle.try_raw().map_err(to_io_error)?.write(buf)
    }

    /// Read into `buf` according to `policy`. Returns the number of bytes
    /// read. `EAGAIN`/`EWOULDBLOCK`/`EINTR` are retried transparently.
    /// `ECONNRESET` and a graceful close (`read` returning `0`) are reported
    /// through distinct error kinds depending on whether any bytes were
    /// already read during this call — that distinction is what lets a
    /// caller decide whether a partially-read request can still be salvaged.
    pub fn blocking_read(&mut self, buf: &mut [u8], policy: BlockingReadPolicy) -> NetResult<usize> {
        let target = buf.len();
        let mut total = 0usize;
        loop {
            match self.read_once(&mut buf[total..]) {
                Ok(0) => {
                    return if total == 0 {
                        Err(NetError::EmptySocketRead)
                    } else {
                        Err(NetError::SocketRead(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "peer closed the connection before the requested buffer was filled",
                        )))
                    };
                }
                Ok(n) => {
                    total += n;
                    match policy {
                        BlockingReadPolicy::ReturnAsap => return Ok(total),
                        BlockingReadPolicy::FillFullBuffer => {
                            if total >= target {
                                return Ok(total);
                            }
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted || e.kind() == io::ErrorKind::WouldBlock => {
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    return Err(if total == 0 {
                        NetError::EmptyConnectionResetByPeer
                    } else {
                        NetError::ConnectionResetByPeer
                    });
                }
                Err(e) => return Err(NetError::SocketRead(e)),
            }
        }
    }

    /// Write the full contents of `data` or fail — a short write is reported
    /// as `SocketCouldNotWriteEverything` rather than returned as a partial
    /// count, matching the "all or fail" contract callers rely on.
    ///
    /// `more` hints that another write will immediately follow (e.g. a
    /// header block followed by a body); callers that want the two to reach
    /// the wire as one segment should instead build a single buffer and pass
    /// it to one call — see [`Connection::blocking_write_vectored`].
    pub fn blocking_write(&mut self, data: &[u8], more: bool) -> NetResult<()> {
        let _ = more;
        let mut written = 0usize;
        while written < data.len() {
            match self.write_once(&data[written..]) {
                Ok(0) => {
                    return Err(NetError::SocketCouldNotWriteEverything {
                        wrote: written,
                        expected: data.len(),
                    })
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(NetError::SocketWrite(e)),
            }
        }
        Ok(())
    }

    /// Convenience over [`blocking_write`](Self::blocking_write) for
    /// callers holding a `&str`, `Vec<u8>`, or `&[u8]` rather than a plain
    /// slice — the idiomatic substitute for the original's C++ template
    /// overloads of the same write call.
    pub fn write_all(&mut self, data: impl AsRef<[u8]>, more: bool) -> NetResult<()> {
        self.blocking_write(data.as_ref(), more)
    }

    /// Write several chunks as if they were one buffer (e.g. response
    /// headers immediately followed by the body), so the "more data
    /// coming" hint between them never has to touch OS-level flags.
    pub fn blocking_write_vectored(&mut self, chunks: &[&[u8]]) -> NetResult<()> {
        for (i, chunk) in chunks.iter().enumerate() {
            let more = i + 1 < chunks.len();
            self.blocking_write(chunk, more)?;
        }
        Ok(())
    }
}

fn to_io_error(e: NetError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::NagleAlgorithm;
    use std::net::{TcpListener, TcpStream};

    fn loopback_pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client_std = TcpStream::connect(addr).unwrap();
        let (server_std, remote) = listener.accept().unwrap();

        let client_socket = socket2::Socket::from(client_std);
        let server_socket = socket2::Socket::from(server_std);

        let client_handle =
            crate::socket::SocketHandle::from_accepted(client_socket, NagleAlgorithm::Keep).unwrap();
        let server_handle =
            crate::socket::SocketHandle::from_accepted(server_socket, NagleAlgorithm::Keep).unwrap();

        let client = Connection::new(
            client_handle,
            IpAndPort { ip: "127.0.0.1".into(), port: 0 },
            IpAndPort::from_socket_addr(addr),
        );
        let server = Connection::new(
            server_handle,
            IpAndPort::from_socket_addr(addr),
            IpAndPort::from_socket_addr(remote),
        );
        (client, server)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (mut client, mut server) = loopback_pair();
        client.blocking_write(b"hello", false).unwrap();
        let mut buf = [0u8; 5];
        let n = server.blocking_read(&mut buf, BlockingReadPolicy::FillFullBuffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn return_asap_does_not_wait_for_full_buffer() {
        let (mut client, mut server) = loopback_pair();
        client.blocking_write(b"hi", false).unwrap();
        let mut buf = [0u8; 64];
        let n = server.blocking_read(&mut buf, BlockingReadPolicy::ReturnAsap).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"hi");
    }

    #[test]
    fn write_all_accepts_a_str_without_the_caller_slicing_it() {
        let (mut client, mut server) = loopback_pair();
        client.write_all("hello", false).unwrap();
        let mut buf = [0u8; 5];
        server.blocking_read(&mut buf, BlockingReadPolicy::FillFullBuffer).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
