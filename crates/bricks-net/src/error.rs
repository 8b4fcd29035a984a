use std::io;

/// Closed taxonomy of failures a caller can match on, per the network/socket
/// error kinds: creation, binding, listening, accepting, connecting, DNS
/// resolution, reading, writing, and use-after-move bugs.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("socket creation failed")]
    SocketCreate(#[source] io::Error),

    #[error("bind failed on port {port}")]
    SocketBind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("listen failed")]
    SocketListen(#[source] io::Error),

    #[error("accept failed")]
    SocketAccept(#[source] io::Error),

    #[error("connect failed")]
    SocketConnect(#[source] io::Error),

    #[error("could not resolve address for {host}:{service}")]
    SocketResolveAddress { host: String, service: String },

    #[error("read failed")]
    SocketRead(#[source] io::Error),

    #[error("connection closed with no bytes read")]
    EmptySocketRead,

    #[error("write failed")]
    SocketWrite(#[source] io::Error),

    #[error("short write: wrote {wrote} of {expected} bytes")]
    SocketCouldNotWriteEverything { wrote: usize, expected: usize },

    #[error("connection reset by peer")]
    ConnectionResetByPeer,

    #[error("connection reset by peer before any bytes were read")]
    EmptyConnectionResetByPeer,

    #[error("socket handle is invalid (never bound/connected)")]
    InvalidSocket,

    #[error("attempted to use a socket handle that has been moved away")]
    AttemptedToUseMovedAwayConnection,

    #[error("getsockname failed")]
    SocketGetSockName(#[source] io::Error),

    #[error("could not convert address to string")]
    InetAddrToString(#[source] io::Error),

    #[error("exhausted the local port range without finding a free port")]
    NoFreeLocalPortFound,
}

pub type NetResult<T> = Result<T, NetError>;
