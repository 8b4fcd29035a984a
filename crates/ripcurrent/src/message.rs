//! Type-erased messages carried across MMPQ edges, plus the small runtime
//! type-list bookkeeping `|` and `+` use to check composition legality.
//!
//! The original's compile-time type-list arithmetic has no equivalent in
//! stable Rust without const generics gymnastics that would obscure more
//! than they'd save; a block declares its LHS/RHS as a runtime `Vec` of
//! `TypeEntry` instead, and composition checks those lists the one time
//! `|`/`+` run, at graph-construction time.

use std::any::{Any, TypeId};

#[derive(Debug, Clone, Copy)]
pub struct TypeEntry {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl TypeEntry {
    pub fn of<T: 'static>() -> Self {
        TypeEntry { type_id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }
}

impl PartialEq for TypeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}
impl Eq for TypeEntry {}

/// A single message in flight, its concrete type erased behind `Any` and
/// recovered by downcasting on the consuming side.
pub struct Envelope {
    pub type_id: TypeId,
    pub name: &'static str,
    pub payload: Box<dyn Any + Send>,
}

impl Envelope {
    pub fn new<T: Any + Send + 'static>(value: T) -> Self {
        Envelope { type_id: TypeId::of::<T>(), name: std::any::type_name::<T>(), payload: Box::new(value) }
    }

    pub fn downcast<T: Any + Send + 'static>(self) -> Result<T, Envelope> {
        if self.type_id == TypeId::of::<T>() {
            Ok(*self.payload.downcast::<T>().expect("type_id matched but downcast failed"))
        } else {
            Err(self)
        }
    }
}

pub(crate) fn union_type_entries(a: &[TypeEntry], b: &[TypeEntry]) -> Vec<TypeEntry> {
    let mut out = a.to_vec();
    for entry in b {
        if !out.contains(entry) {
            out.push(*entry);
        }
    }
    out
}

/// `|` requires the left side's RHS and the right side's LHS to name
/// exactly the same set of types, in any order.
pub(crate) fn assert_sequence_legal(left_name: &str, left_rhs: &[TypeEntry], right_name: &str, right_lhs: &[TypeEntry]) {
    let matches = left_rhs.len() == right_lhs.len() && left_rhs.iter().all(|e| right_lhs.contains(e));
    assert!(
        matches,
        "cannot sequence `{left_name}` (RHS = {:?}) with `{right_name}` (LHS = {:?}): type lists do not match",
        names(left_rhs),
        names(right_lhs)
    );
}

fn names(entries: &[TypeEntry]) -> Vec<&'static str> {
    entries.iter().map(|e| e.name).collect()
}
