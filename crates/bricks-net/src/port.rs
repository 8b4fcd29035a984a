use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::error::{NetError, NetResult};
use crate::socket::{
    NagleAlgorithm, SocketHandle, DEFAULT_MAX_SERVER_QUEUED_CONNECTIONS,
    DEFAULT_NAGLE_ALGORITHM_POLICY,
};

/// Inclusive range candidate ports are drawn from by [`reserve_local_port`].
pub const PICK_FREE_PORT_MIN: u16 = 25000;
pub const PICK_FREE_PORT_MAX: u16 = 29000;

/// A socket that has already bound and listened on a port. The port is held
/// from the moment of reservation until the handle is handed to a server
/// (via [`ReservedLocalPort::into_handle`]), eliminating the flaky "server
/// didn't start listening yet" race a bare `u16` port number invites.
#[derive(Debug)]
pub struct ReservedLocalPort {
    handle: SocketHandle,
    port: u16,
}

impl ReservedLocalPort {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn handle(&self) -> &SocketHandle {
        &self.handle
    }

    pub fn into_handle(self) -> SocketHandle {
        self.handle
    }
}

impl From<&ReservedLocalPort> for u16 {
    fn from(r: &ReservedLocalPort) -> u16 {
        r.port
    }
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// Select a pseudo-random free port in `[PICK_FREE_PORT_MIN, PICK_FREE_PORT_MAX]`
/// by shuffling the candidate range and trying to bind+listen on each in
/// turn, skipping ports that fail with a bind/listen error. Exhausting the
/// entire range without success is a resource-exhaustion condition the
/// original treats as fatal (`exit(-1)`); we panic for the same reason: a
/// process that cannot obtain any of 4000 local ports has a broken
/// environment and no caller can recover from it.
pub fn reserve_local_port() -> ReservedLocalPort {
    reserve_local_port_with(DEFAULT_NAGLE_ALGORITHM_POLICY, DEFAULT_MAX_SERVER_QUEUED_CONNECTIONS)
}

pub fn reserve_local_port_with(nagle: NagleAlgorithm, backlog: i32) -> ReservedLocalPort {
    let mut order: Vec<u16> = (PICK_FREE_PORT_MIN..=PICK_FREE_PORT_MAX).collect();
    order.shuffle(&mut thread_rng());

    for port in order {
        match SocketHandle::bind_and_listen(loopback(port), nagle, backlog) {
            Ok(handle) => {
                tracing::debug!(port, "reserved local port");
                return ReservedLocalPort { handle, port };
            }
            Err(NetError::SocketBind { .. }) | Err(NetError::SocketListen(_)) => continue,
            Err(other) => {
                tracing::error!(port, error = %other, "unexpected error while reserving a local port");
                continue;
            }
        }
    }

    panic!(
        "bricks_net::reserve_local_port: exhausted the full range {}..={} without finding a free port",
        PICK_FREE_PORT_MIN, PICK_FREE_PORT_MAX
    );
}

/// Bind and listen on an explicit port, propagating the error (unlike
/// [`reserve_local_port`], which retries and ultimately panics).
pub fn acquire_local_port(port: u16) -> NetResult<ReservedLocalPort> {
    acquire_local_port_with(port, DEFAULT_NAGLE_ALGORITHM_POLICY, DEFAULT_MAX_SERVER_QUEUED_CONNECTIONS)
}

pub fn acquire_local_port_with(
    port: u16,
    nagle: NagleAlgorithm,
    backlog: i32,
) -> NetResult<ReservedLocalPort> {
    let handle = SocketHandle::bind_and_listen(loopback(port), nagle, backlog)?;
    Ok(ReservedLocalPort { handle, port })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_returns_port_in_range() {
        let reserved = reserve_local_port();
        assert!(reserved.port() >= PICK_FREE_PORT_MIN);
        assert!(reserved.port() <= PICK_FREE_PORT_MAX);
    }

    #[test]
    fn acquire_same_port_twice_fails() {
        let first = acquire_local_port(27231);
        if let Ok(first) = first {
            let second = acquire_local_port(27231);
            assert!(second.is_err());
            drop(first);
        }
    }
}
