//! A typed, composable dataflow engine. Blocks are joined with `|`
//! (sequence, an MMPQ edge in between) and `+` (parallel, dispatched by
//! runtime type identity), and a complete graph (empty LHS and RHS) is
//! started with [`Block::rip_current`].

pub mod block;
pub mod builtin;
pub mod config;
pub mod error;
pub mod message;
pub mod mmpq;
pub mod scope;

pub use block::{Block, BlockLogic, Outbound};
pub use builtin::{drop_type, pass};
pub use config::RipCurrentConfig;
pub use error::{scoped_error_handler, ErrorHandler, InjectedHandlerScope, RipCurrentError, RipCurrentResult};
pub use message::{Envelope, TypeEntry};
pub use mmpq::{Mmpq, MmpqStats};
pub use scope::Scope;
