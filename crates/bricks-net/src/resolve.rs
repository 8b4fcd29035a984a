use std::net::{SocketAddr, ToSocketAddrs};

use crate::connection::{Connection, IpAndPort};
use crate::error::{NetError, NetResult};
use crate::socket::{NagleAlgorithm, SocketHandle, DEFAULT_NAGLE_ALGORITHM_POLICY};

/// Render a socket address's IP component as a string. Kept as a standalone
/// function (rather than inlined at call sites) because both the client
/// connect path and the server's accept-logging path need it.
pub fn inet_addr_to_string(addr: &SocketAddr) -> NetResult<String> {
    Ok(addr.ip().to_string())
}

/// Resolve `host:port` and return the first candidate address, the same
/// "use the first resolved record" policy the original's `ResolveIPFromHostname`
/// uses. Multiple `A`/`AAAA` records are not retried across; see DESIGN.md.
pub fn resolve_first(host: &str, port: u16) -> NetResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|_| NetError::SocketResolveAddress { host: host.to_string(), service: port.to_string() })?
        .next()
        .ok_or_else(|| NetError::SocketResolveAddress { host: host.to_string(), service: port.to_string() })
}

/// Outbound client connect: resolve, then build a `DoNotBind`-mode socket
/// and connect it, capturing both endpoints.
pub fn client_connect(host: &str, port: u16) -> NetResult<Connection> {
    client_connect_with(host, port, DEFAULT_NAGLE_ALGORITHM_POLICY)
}

pub fn client_connect_with(host: &str, port: u16, nagle: NagleAlgorithm) -> NetResult<Connection> {
    let remote_addr = resolve_first(host, port)?;
    let handle = SocketHandle::connect(remote_addr, nagle)?;
    let local_addr = handle.local_addr()?;
    tracing::debug!(host, port, %remote_addr, "client connected");
    Ok(Connection::new(handle, IpAndPort::from_socket_addr(local_addr), IpAndPort::from_socket_addr(remote_addr)))
}
