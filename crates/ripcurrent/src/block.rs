//! Blocks and their composition. A [`Block`] wraps one leaf's logic (or a
//! tree of leaves joined by `|`/`+`) along with the LHS/RHS type lists
//! `|` and `+` check at composition time; [`Block::rip_current`] builds
//! the graph (MMPQ edges, consumer threads) and returns a [`Scope`].

use std::panic::Location;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::message::{assert_sequence_legal, union_type_entries, Envelope, TypeEntry};
use crate::mmpq::Mmpq;
use crate::error::{report, report_leaked_block};
use crate::error::RipCurrentResult;
use crate::scope::Scope;

/// Emits messages downstream of a block. `emit` timestamps with wall-clock
/// time; `post`/`schedule` take an explicit timestamp for deterministic
/// tests and replay. Each method panics if `T` was not declared in the
/// block's RHS — the runtime equivalent of the type-list check the
/// original performs at compile time.
pub struct Outbound {
    downstream: Option<Arc<Mmpq>>,
    rhs: Vec<TypeEntry>,
}

impl Outbound {
    fn new(downstream: Option<Arc<Mmpq>>, rhs: Vec<TypeEntry>) -> Self {
        Outbound { downstream, rhs }
    }

    fn assert_rhs<T: 'static>(&self) {
        let id = std::any::TypeId::of::<T>();
        assert!(self.rhs.iter().any(|e| e.type_id == id), "type `{}` is not in this block's declared RHS", std::any::type_name::<T>());
    }

    pub fn emit<T: Send + 'static>(&self, value: T) {
        let t = now_nanos();
        if let Err(e) = self.try_post(t, value) {
            report(&format!("emit rejected: {e}"));
        }
    }

    pub fn post<T: Send + 'static>(&self, t: i64, value: T) {
        if let Err(e) = self.try_post(t, value) {
            report(&format!("post rejected: {e}"));
        }
    }

    pub fn schedule<T: Send + 'static>(&self, t: i64, value: T) {
        if let Err(e) = self.try_schedule(t, value) {
            report(&format!("schedule rejected: {e}"));
        }
    }

    pub fn head(&self, t: i64) {
        if let Err(e) = self.try_head(t) {
            report(&format!("head update rejected: {e}"));
        }
    }

    /// Like [`post`](Self::post), surfacing the HEAD-monotonicity
    /// violation instead of only logging it.
    pub fn try_post<T: Send + 'static>(&self, t: i64, value: T) -> RipCurrentResult<()> {
        self.assert_rhs::<T>();
        match &self.downstream {
            Some(mmpq) => mmpq.publish(Envelope::new(value), t),
            None => Ok(()),
        }
    }

    pub fn try_schedule<T: Send + 'static>(&self, t: i64, value: T) -> RipCurrentResult<()> {
        self.assert_rhs::<T>();
        match &self.downstream {
            Some(mmpq) => mmpq.schedule(Envelope::new(value), t),
            None => Ok(()),
        }
    }

    pub fn try_head(&self, t: i64) -> RipCurrentResult<()> {
        match &self.downstream {
            Some(mmpq) => mmpq.update_head(t),
            None => Ok(()),
        }
    }

    /// Signals that this producer has nothing left to emit. Edges with more
    /// than one producer (wired up by `+`) only actually shut down once
    /// every producer sharing them has called this — see
    /// [`Mmpq::producer_done`].
    fn signal_producer_done(&self) {
        if let Some(mmpq) = &self.downstream {
            mmpq.producer_done();
        }
    }
}

fn now_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before the epoch")
        .as_nanos() as i64
}

/// What a leaf does. Blocks with a non-empty LHS implement `handle`,
/// called once per inbound message by the block's consumer thread, in
/// strict ascending timestamp order. Blocks with an empty LHS (sources)
/// implement `run` instead, called exactly once on their own thread since
/// there is no upstream MMPQ to drive them.
pub trait BlockLogic: Send + 'static {
    fn name(&self) -> &'static str;
    fn lhs(&self) -> Vec<TypeEntry>;
    fn rhs(&self) -> Vec<TypeEntry>;

    fn handle(&mut self, _input: Envelope, _outbound: &Outbound) {}
    fn run(&mut self, _outbound: &Outbound) {}
}

pub(crate) enum BlockNode {
    Leaf(Box<dyn BlockLogic>),
    Seq(Box<BlockNode>, Box<BlockNode>),
    Par(Box<BlockNode>, Box<BlockNode>),
}

fn node_lhs(node: &BlockNode) -> Vec<TypeEntry> {
    match node {
        BlockNode::Leaf(l) => l.lhs(),
        BlockNode::Seq(a, _) => node_lhs(a),
        BlockNode::Par(a, b) => union_type_entries(&node_lhs(a), &node_lhs(b)),
    }
}

fn node_rhs(node: &BlockNode) -> Vec<TypeEntry> {
    match node {
        BlockNode::Leaf(l) => l.rhs(),
        BlockNode::Seq(_, b) => node_rhs(b),
        BlockNode::Par(a, b) => union_type_entries(&node_rhs(a), &node_rhs(b)),
    }
}

/// How many independent producer threads `node` will eventually wire up to
/// whatever downstream edge it's given. A source leaf and a `Seq` each
/// contribute exactly one completion signal (one dedicated thread apiece);
/// a non-source leaf contributes none of its own (it's driven inline by
/// whatever feeds its inbound); a `+` sums its branches, since both sides
/// independently finish onto the same shared downstream.
fn producer_count(node: &BlockNode) -> usize {
    match node {
        BlockNode::Leaf(l) => {
            if l.lhs().is_empty() {
                1
            } else {
                0
            }
        }
        BlockNode::Seq(_, _) => 1,
        BlockNode::Par(a, b) => producer_count(a) + producer_count(b),
    }
}

fn describe_node(node: &BlockNode, with_types: bool) -> String {
    match node {
        BlockNode::Leaf(l) => {
            if with_types {
                format!("{}[{:?} -> {:?}]", l.name(), names(&l.lhs()), names(&l.rhs()))
            } else {
                l.name().to_string()
            }
        }
        BlockNode::Seq(a, b) => format!("({} | {})", describe_node(a, with_types), describe_node(b, with_types)),
        BlockNode::Par(a, b) => format!("({} + {})", describe_node(a, with_types), describe_node(b, with_types)),
    }
}

fn names(entries: &[TypeEntry]) -> Vec<&'static str> {
    entries.iter().map(|e| e.name).collect()
}

/// Tracks whether a constructed [`Block`] was ever composed, run, or
/// explicitly dismissed. Reports to the error sink on drop if not —
/// catching a block built and silently discarded, which would otherwise
/// fail only by the absence of behavior no one would notice until later.
struct UsageGuard {
    name: String,
    site: &'static Location<'static>,
    used: bool,
}

impl UsageGuard {
    fn mark_used(mut self) {
        self.used = true;
    }
}

impl Drop for UsageGuard {
    fn drop(&mut self) {
        if !self.used {
            report_leaked_block(&self.name, self.site);
        }
    }
}

/// A block, or a tree of blocks joined by `|` (sequence) and `+`
/// (parallel). Build leaves with [`leaf`], combine with the operators,
/// and finish an end-to-end block (empty LHS and RHS) with
/// [`rip_current`](Block::rip_current).
pub struct Block {
    pub(crate) lhs: Vec<TypeEntry>,
    pub(crate) rhs: Vec<TypeEntry>,
    name: String,
    node: BlockNode,
    guard: UsageGuard,
}

impl Block {
    #[track_caller]
    pub fn leaf(logic: impl BlockLogic) -> Self {
        let name = logic.name().to_string();
        let lhs = logic.lhs();
        let rhs = logic.rhs();
        Block {
            lhs,
            rhs,
            name: name.clone(),
            node: BlockNode::Leaf(Box::new(logic)),
            guard: UsageGuard { name, site: Location::caller(), used: false },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn describe(&self) -> String {
        describe_node(&self.node, false)
    }

    pub fn describe_with_types(&self) -> String {
        describe_node(&self.node, true)
    }

    /// Explicitly discards a block without composing or running it,
    /// suppressing the unused-block diagnostic. For blocks built for
    /// their side effects at construction time, or genuinely unused ones
    /// in a test.
    pub fn dismiss(self) {
        self.guard.mark_used();
    }

    /// Materializes an end-to-end block (empty LHS and RHS) into a
    /// running graph, using the default MMPQ capacity.
    pub fn rip_current(self) -> Scope {
        self.rip_current_with(&crate::config::RipCurrentConfig::default())
    }

    pub fn rip_current_with(self, cfg: &crate::config::RipCurrentConfig) -> Scope {
        assert!(
            self.lhs.is_empty() && self.rhs.is_empty(),
            "RipCurrent() requires an end-to-end block (empty LHS and RHS); got LHS={:?} RHS={:?}",
            names(&self.lhs),
            names(&self.rhs)
        );
        self.guard.mark_used();
        let mut graph = BuiltGraph::default();
        let _entry = build(self.node, None, cfg.mmpq_capacity, &mut graph);
        Scope::new(graph.threads, graph.mmpqs)
    }
}

impl std::ops::BitOr for Block {
    type Output = Block;

    #[track_caller]
    fn bitor(self, other: Block) -> Block {
        assert_sequence_legal(&self.name, &self.rhs, &other.name, &other.lhs);
        let name = format!("({} | {})", self.name, other.name);
        let lhs = self.lhs.clone();
        let rhs = other.rhs.clone();
        self.guard.mark_used();
        other.guard.mark_used();
        Block {
            lhs,
            rhs,
            name: name.clone(),
            node: BlockNode::Seq(Box::new(self.node), Box::new(other.node)),
            guard: UsageGuard { name, site: Location::caller(), used: false },
        }
    }
}

impl std::ops::Add for Block {
    type Output = Block;

    #[track_caller]
    fn add(self, other: Block) -> Block {
        let lhs = union_type_entries(&self.lhs, &other.lhs);
        let rhs = union_type_entries(&self.rhs, &other.rhs);
        let name = format!("({} + {})", self.name, other.name);
        self.guard.mark_used();
        other.guard.mark_used();
        Block {
            lhs,
            rhs,
            name: name.clone(),
            node: BlockNode::Par(Box::new(self.node), Box::new(other.node)),
            guard: UsageGuard { name, site: Location::caller(), used: false },
        }
    }
}

#[derive(Default)]
pub(crate) struct BuiltGraph {
    pub(crate) threads: Vec<JoinHandle<()>>,
    pub(crate) mmpqs: Vec<Arc<Mmpq>>,
}

type Inbound = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Recursively wires `node` to `downstream` (the MMPQ its RHS writes
/// into, or `None` if it is the last stage), spawning one consumer
/// thread per `|` seam plus one thread per source leaf, and returns the
/// entry point callers use to feed `node`'s LHS.
fn build(node: BlockNode, downstream: Option<Arc<Mmpq>>, capacity: usize, graph: &mut BuiltGraph) -> Inbound {
    match node {
        BlockNode::Leaf(logic) => build_leaf(logic, downstream, graph),
        BlockNode::Seq(a, b) => {
            let b_downstream = downstream.clone();
            let b_inbound = build(*b, downstream, capacity, graph);
            let seam = Mmpq::new(capacity);
            seam.set_producer_count(producer_count(&a));
            graph.mmpqs.push(seam.clone());
            let consumer_seam = seam.clone();
            let handle = std::thread::spawn(move || {
                while let Some(envelope) = consumer_seam.pop_ready() {
                    b_inbound(envelope);
                }
                // `b` (and everything it dispatches into) will never
                // produce again: propagate shutdown one seam further. This
                // Seq node is itself exactly one producer on `b_downstream`.
                if let Some(ds) = &b_downstream {
                    ds.producer_done();
                }
            });
            graph.threads.push(handle);
            build(*a, Some(seam), capacity, graph)
        }
        BlockNode::Par(a, b) => {
            let a_lhs = node_lhs(&a);
            let a_inbound = build(*a, downstream.clone(), capacity, graph);
            let b_inbound = build(*b, downstream, capacity, graph);
            Arc::new(move |envelope: Envelope| {
                if a_lhs.iter().any(|e| e.type_id == envelope.type_id) {
                    a_inbound(envelope);
                } else {
                    b_inbound(envelope);
                }
            })
        }
    }
}

fn build_leaf(logic: Box<dyn BlockLogic>, downstream: Option<Arc<Mmpq>>, graph: &mut BuiltGraph) -> Inbound {
    let rhs = logic.rhs();
    let is_source = logic.lhs().is_empty();
    let outbound = Outbound::new(downstream, rhs);
    let logic = Arc::new(Mutex::new(logic));

    if is_source {
        let logic = logic.clone();
        let handle = std::thread::spawn(move || {
            logic.lock().unwrap_or_else(|e| e.into_inner()).run(&outbound);
            outbound.signal_producer_done();
        });
        graph.threads.push(handle);
        Arc::new(|_: Envelope| unreachable!("a source block has no declared LHS to dispatch to"))
    } else {
        Arc::new(move |envelope: Envelope| {
            logic.lock().unwrap_or_else(|e| e.into_inner()).handle(envelope, &outbound);
        })
    }
}
