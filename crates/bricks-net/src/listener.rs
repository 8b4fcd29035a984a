use crate::connection::{Connection, IpAndPort};
use crate::error::{NetError, NetResult};
use crate::port::ReservedLocalPort;
use crate::socket::{NagleAlgorithm, SocketHandle, DEFAULT_NAGLE_ALGORITHM_POLICY};

/// A bound, listening socket. `Accept()` in the original; here, a thin
/// wrapper that turns a [`ReservedLocalPort`] into a source of
/// [`Connection`]s.
pub struct Listener {
    handle: SocketHandle,
    local: IpAndPort,
    nagle: NagleAlgorithm,
}

impl Listener {
    /// Hand a held port reservation to the server. The reservation's socket
    /// becomes the accepting socket from this point on.
    pub fn from_reserved(reserved: ReservedLocalPort) -> NetResult<Self> {
        Self::from_reserved_with(reserved, DEFAULT_NAGLE_ALGORITHM_POLICY)
    }

    pub fn from_reserved_with(reserved: ReservedLocalPort, nagle: NagleAlgorithm) -> NetResult<Self> {
        let port = reserved.port();
        let handle = reserved.into_handle();
        let local = IpAndPort::from_socket_addr(handle.local_addr()?);
        debug_assert_eq!(local.port, port);
        Ok(Listener { handle, local, nagle })
    }

    pub fn local_ip_and_port(&self) -> &IpAndPort {
        &self.local
    }

    /// Block until a new connection arrives, then return it as a fully
    /// formed [`Connection`] with both endpoints populated.
    pub fn accept(&self) -> NetResult<Connection> {
        let (accepted, remote_addr) = self.handle.try_raw()?.accept().map_err(NetError::SocketAccept)?;
        let remote_addr = remote_addr
            .as_socket()
            .ok_or_else(|| NetError::SocketAccept(std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "non-IP peer address")))?;
        let handle = SocketHandle::from_accepted(accepted, self.nagle)?;
        tracing::debug!(local = %self.local, remote = %remote_addr, "accepted connection");
        Ok(Connection::new(handle, self.local.clone(), IpAndPort::from_socket_addr(remote_addr)))
    }
}
