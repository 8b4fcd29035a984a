use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket as RawSocket, Type};

use crate::error::{NetError, NetResult};

/// Whether Nagle's algorithm (send coalescing) is left enabled or disabled
/// (`TCP_NODELAY`) for a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NagleAlgorithm {
    Disable,
    Keep,
}

pub const DEFAULT_NAGLE_ALGORITHM_POLICY: NagleAlgorithm = NagleAlgorithm::Keep;

/// Default backlog passed to `listen()` when the caller does not override it.
pub const DEFAULT_MAX_SERVER_QUEUED_CONNECTIONS: i32 = 1024;

#[derive(Debug)]
enum State {
    Valid(RawSocket),
    /// Never bound/connected/accepted — the handle is a sentinel.
    Invalid,
    /// Used to be valid; its file descriptor has been transferred elsewhere.
    MovedAway,
}

/// An owned, non-copyable POSIX stream socket.
///
/// Exactly one of [`SocketHandle::bind_and_listen`], [`SocketHandle::connect`],
/// or [`SocketHandle::from_accepted`] produces a valid handle; calling
/// [`SocketHandle::take_raw`] leaves the handle in the moved-away state, so a
/// second attempt to use it fails with `AttemptedToUseMovedAwayConnection`
/// rather than silently reusing a file descriptor someone else now owns.
#[derive(Debug)]
pub struct SocketHandle {
    state: State,
}

impl SocketHandle {
    fn new_raw(addr: &SocketAddr, nagle: NagleAlgorithm) -> NetResult<RawSocket> {
        let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket = RawSocket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(NetError::SocketCreate)?;
        #[cfg(not(windows))]
        socket.set_reuse_address(true).map_err(NetError::SocketCreate)?;
        if nagle == NagleAlgorithm::Disable {
            socket.set_nodelay(true).map_err(NetError::SocketCreate)?;
        }
        Ok(socket)
    }

    /// Bind and listen on `addr`, with the given backlog. Used both by
    /// `bricks_net::acquire_local_port` (explicit port) and by
    /// `reserve_local_port`'s bind-attempt loop (candidate ports).
    pub fn bind_and_listen(
        addr: SocketAddr,
        nagle: NagleAlgorithm,
        backlog: i32,
    ) -> NetResult<Self> {
        let socket = Self::new_raw(&addr, nagle)?;
        socket.bind(&addr.into()).map_err(|source| NetError::SocketBind {
            port: addr.port(),
            source,
        })?;
        socket.listen(backlog).map_err(NetError::SocketListen)?;
        socket.set_nonblocking(false).map_err(NetError::SocketCreate)?;
        tracing::debug!(port = addr.port(), "bound and listening");
        Ok(Self { state: State::Valid(socket) })
    }

    /// Outbound "connect" construction mode (the original's `DoNotBind`
    /// socket used by the client path): resolve, create, and connect.
    pub fn connect(addr: SocketAddr, nagle: NagleAlgorithm) -> NetResult<Self> {
        let socket = Self::new_raw(&addr, nagle)?;
        socket.connect(&addr.into()).map_err(NetError::SocketConnect)?;
        tracing::debug!(%addr, "connected");
        Ok(Self { state: State::Valid(socket) })
    }

    /// Wrap a file descriptor returned by `accept()`.
    pub fn from_accepted(socket: RawSocket, nagle: NagleAlgorithm) -> NetResult<Self> {
        if nagle == NagleAlgorithm::Disable {
            socket.set_nodelay(true).map_err(NetError::SocketCreate)?;
        }
        Ok(Self { state: State::Valid(socket) })
    }

    /// A handle that was never bound/connected — used only to construct
    /// error paths and tests exercising `InvalidSocket`.
    pub fn invalid() -> Self {
        Self { state: State::Invalid }
    }

    /// Borrow the underlying socket, failing with the right error kind if
    /// this handle is a sentinel or has been moved away.
    pub fn try_raw(&self) -> NetResult<&RawSocket> {
        match &self.state {
            State::Valid(s) => Ok(s),
            State::Invalid => Err(NetError::InvalidSocket),
            State::MovedAway => Err(NetError::AttemptedToUseMovedAwayConnection),
        }
    }

    /// Take ownership of the raw socket, leaving this handle moved-away.
    /// Used when constructing a [`crate::Connection`] that now owns the fd.
    pub fn take_raw(&mut self) -> NetResult<RawSocket> {
        match std::mem::replace(&mut self.state, State::MovedAway) {
            State::Valid(s) => Ok(s),
            State::Invalid => {
                self.state = State::Invalid;
                Err(NetError::InvalidSocket)
            }
            State::MovedAway => Err(NetError::AttemptedToUseMovedAwayConnection),
        }
    }

    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> NetResult<()> {
        self.try_raw()?.set_read_timeout(timeout).map_err(NetError::SocketRead)
    }

    pub fn local_addr(&self) -> NetResult<SocketAddr> {
        let raw = self.try_raw()?;
        raw.local_addr()
            .map_err(NetError::SocketGetSockName)?
            .as_socket()
            .ok_or(NetError::SocketGetSockName(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "non-IP local address",
            )))
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        if let State::Valid(socket) = &self.state {
            let _ = socket.shutdown(std::net::Shutdown::Both);
        }
        // RawSocket's own Drop closes the file descriptor.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_fails_with_invalid_socket() {
        let handle = SocketHandle::invalid();
        assert!(matches!(handle.try_raw(), Err(NetError::InvalidSocket)));
    }

    #[test]
    fn taking_raw_twice_fails_with_moved_away() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mut handle = SocketHandle::bind_and_listen(addr, NagleAlgorithm::Keep, 16).unwrap();
        assert!(handle.take_raw().is_ok());
        assert!(matches!(
            handle.take_raw(),
            Err(NetError::AttemptedToUseMovedAwayConnection)
        ));
    }

    #[test]
    fn bind_and_listen_yields_a_nonzero_port() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let handle = SocketHandle::bind_and_listen(addr, NagleAlgorithm::Keep, 16).unwrap();
        assert_ne!(handle.local_addr().unwrap().port(), 0);
    }
}
