//! The two stock single-type blocks every dataflow needs: `Pass<T>` forwards
//! a message unchanged, `Drop<T>` discards it. Both exist mainly as plumbing
//! to round out a `+` group's type lists without writing a custom
//! `BlockLogic` for what is otherwise a no-op leg.

use std::marker::PhantomData;

use crate::block::{Block, BlockLogic, Outbound};
use crate::message::{Envelope, TypeEntry};

struct PassLogic<T> {
    _marker: PhantomData<T>,
}

impl<T: Send + 'static> BlockLogic for PassLogic<T> {
    fn name(&self) -> &'static str {
        "Pass"
    }
    fn lhs(&self) -> Vec<TypeEntry> {
        vec![TypeEntry::of::<T>()]
    }
    fn rhs(&self) -> Vec<TypeEntry> {
        vec![TypeEntry::of::<T>()]
    }
    fn handle(&mut self, input: Envelope, outbound: &Outbound) {
        let value = input.downcast::<T>().unwrap_or_else(|_| panic!("Pass<{}> received a mismatched type", std::any::type_name::<T>()));
        outbound.emit(value);
    }
}

/// A block whose LHS and RHS are both `{T}`, forwarding every message
/// through unchanged.
#[track_caller]
pub fn pass<T: Send + 'static>() -> Block {
    Block::leaf(PassLogic::<T> { _marker: PhantomData })
}

struct DropLogic<T> {
    _marker: PhantomData<T>,
}

impl<T: Send + 'static> BlockLogic for DropLogic<T> {
    fn name(&self) -> &'static str {
        "Drop"
    }
    fn lhs(&self) -> Vec<TypeEntry> {
        vec![TypeEntry::of::<T>()]
    }
    fn rhs(&self) -> Vec<TypeEntry> {
        Vec::new()
    }
    fn handle(&mut self, _input: Envelope, _outbound: &Outbound) {}
}

/// A block whose LHS is `{T}` and RHS is empty, discarding every message.
#[track_caller]
pub fn drop_type<T: Send + 'static>() -> Block {
    Block::leaf(DropLogic::<T> { _marker: PhantomData })
}
