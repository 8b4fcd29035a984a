//! The handle returned by [`Block::rip_current`](crate::block::Block::rip_current):
//! owns every thread and MMPQ edge spawned for one running graph.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::mmpq::Mmpq;

/// A running dataflow graph. Each consumer/source thread tears itself
/// down by propagating shutdown to its own downstream edge as soon as it
/// has nothing left to produce, so [`join`](Scope::join) only needs to
/// wait on every thread — none can deadlock waiting on a sibling that
/// never starts draining, because each edge's shutdown is driven purely
/// by its own upstream state.
pub struct Scope {
    threads: Vec<JoinHandle<()>>,
    #[allow(dead_code)]
    mmpqs: Vec<Arc<Mmpq>>,
    joined: bool,
    detached: bool,
}

impl Scope {
    pub(crate) fn new(threads: Vec<JoinHandle<()>>, mmpqs: Vec<Arc<Mmpq>>) -> Self {
        Scope { threads, mmpqs, joined: false, detached: false }
    }

    /// Blocks until every block in the graph has drained and exited.
    pub fn join(mut self) {
        self.joined = true;
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }

    /// Marks the graph to keep running in the background. The scope still
    /// joins every thread, just silently and in its own destructor instead
    /// of on an explicit call here — this only suppresses the
    /// forgotten-join diagnostic [`Drop`] would otherwise raise.
    pub fn async_(mut self) {
        self.detached = true;
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.joined {
            return;
        }
        if !self.detached {
            crate::error::report(
                "a RipCurrent scope was dropped without calling join() or async_(); \
                 joining its threads now, but this indicates a forgotten teardown call",
            );
        }
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
