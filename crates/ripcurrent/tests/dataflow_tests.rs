use std::sync::{Arc, Mutex};

use ripcurrent::block::{Block, BlockLogic, Outbound};
use ripcurrent::{drop_type, Envelope, TypeEntry};

/// A source that posts a fixed sequence of `(value, timestamp)` pairs via
/// `try_post`, recording which ones were rejected.
struct ScriptedSource {
    entries: Vec<(i32, i64)>,
    rejected: Arc<Mutex<Vec<i32>>>,
}

impl BlockLogic for ScriptedSource {
    fn name(&self) -> &'static str {
        "ScriptedSource"
    }
    fn lhs(&self) -> Vec<TypeEntry> {
        Vec::new()
    }
    fn rhs(&self) -> Vec<TypeEntry> {
        vec![TypeEntry::of::<i32>()]
    }
    fn run(&mut self, outbound: &Outbound) {
        for (value, t) in &self.entries {
            if outbound.try_post(*t, *value).is_err() {
                self.rejected.lock().unwrap().push(*value);
            }
        }
    }
}

/// A source that schedules a fixed set of future entries, then advances
/// HEAD through a fixed sequence after a short delay.
struct ScriptedScheduler {
    schedule: Vec<(i32, i64)>,
    heads: Vec<i64>,
}

impl BlockLogic for ScriptedScheduler {
    fn name(&self) -> &'static str {
        "ScriptedScheduler"
    }
    fn lhs(&self) -> Vec<TypeEntry> {
        Vec::new()
    }
    fn rhs(&self) -> Vec<TypeEntry> {
        vec![TypeEntry::of::<i32>()]
    }
    fn run(&mut self, outbound: &Outbound) {
        for (value, t) in &self.schedule {
            outbound.schedule(*t, *value);
        }
        for t in &self.heads {
            outbound.head(*t);
        }
    }
}

struct CollectingSink {
    seen: Arc<Mutex<Vec<i32>>>,
}

impl BlockLogic for CollectingSink {
    fn name(&self) -> &'static str {
        "CollectingSink"
    }
    fn lhs(&self) -> Vec<TypeEntry> {
        vec![TypeEntry::of::<i32>()]
    }
    fn rhs(&self) -> Vec<TypeEntry> {
        Vec::new()
    }
    fn handle(&mut self, input: Envelope, _outbound: &Outbound) {
        let value = input.downcast::<i32>().unwrap_or_else(|_| panic!("unexpected type"));
        self.seen.lock().unwrap().push(value);
    }
}

#[test]
fn mmpq_rejects_timestamps_behind_head_and_delivers_the_rest_in_order() {
    let rejected = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let source = Block::leaf(ScriptedSource {
        entries: vec![(1, 1), (3, 3), (2, 2)],
        rejected: rejected.clone(),
    });
    let sink = Block::leaf(CollectingSink { seen: seen.clone() });

    (source | sink).rip_current().join();

    assert_eq!(*rejected.lock().unwrap(), vec![2]);
    assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
}

#[test]
fn scheduled_entries_are_released_in_timestamp_order_as_head_advances() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let source = Block::leaf(ScriptedScheduler {
        schedule: vec![(11, 11), (19, 19), (12, 12), (17, 17)],
        heads: vec![11, 12, 18, 20],
    });
    let sink = Block::leaf(CollectingSink { seen: seen.clone() });

    (source | sink).rip_current().join();

    assert_eq!(*seen.lock().unwrap(), vec![11, 12, 17, 19]);
}

/// A source that, if given `wait`, blocks until it receives a handoff
/// before posting; if given `notify`, sends the handoff right after
/// posting. Lets a test force one producer to fully finish (thread
/// returned, producer-done signaled) strictly before a sibling producer
/// sharing the same downstream even starts its own publish.
struct HandoffSource {
    value: i32,
    t: i64,
    notify: Option<std::sync::mpsc::Sender<()>>,
    wait: Option<std::sync::mpsc::Receiver<()>>,
}

impl BlockLogic for HandoffSource {
    fn name(&self) -> &'static str {
        "HandoffSource"
    }
    fn lhs(&self) -> Vec<TypeEntry> {
        Vec::new()
    }
    fn rhs(&self) -> Vec<TypeEntry> {
        vec![TypeEntry::of::<i32>()]
    }
    fn run(&mut self, outbound: &Outbound) {
        if let Some(wait) = self.wait.take() {
            wait.recv().unwrap();
        }
        outbound.try_post(self.t, self.value).unwrap();
        if let Some(notify) = self.notify.take() {
            notify.send(()).unwrap();
        }
    }
}

#[test]
fn two_producers_sharing_a_downstream_both_deliver_before_it_shuts_down() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = std::sync::mpsc::channel();

    // `first` posts and finishes immediately; `second` only starts its own
    // post once `first` is fully done. If the shared seam shut down as soon
    // as any one of its two producers finished, `second`'s post would be
    // stranded with no consumer left to drain it.
    let first = Block::leaf(HandoffSource { value: 10, t: 1, notify: Some(tx), wait: None });
    let second = Block::leaf(HandoffSource { value: 20, t: 2, notify: None, wait: Some(rx) });
    let sink = Block::leaf(CollectingSink { seen: seen.clone() });

    ((first + second) | sink).rip_current().join();

    assert_eq!(*seen.lock().unwrap(), vec![10, 20]);
}

#[test]
fn describe_renders_the_composition_tree() {
    let source = Block::leaf(ScriptedSource { entries: Vec::new(), rejected: Arc::new(Mutex::new(Vec::new())) });
    let combined = source | drop_type::<i32>();
    assert_eq!(combined.describe(), "(ScriptedSource | Drop)");
    assert!(combined.describe_with_types().contains("ScriptedSource"));
    combined.dismiss();
}

#[test]
fn dismiss_suppresses_the_leaked_block_diagnostic() {
    use ripcurrent::error::ErrorHandler;

    struct RecordingHandler(Arc<Mutex<Vec<String>>>);
    impl ErrorHandler for RecordingHandler {
        fn handle(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    let messages = Arc::new(Mutex::new(Vec::new()));
    let _guard = ripcurrent::scoped_error_handler(RecordingHandler(messages.clone()));

    {
        let _leaked = Block::leaf(ScriptedSource { entries: Vec::new(), rejected: Arc::new(Mutex::new(Vec::new())) });
    }
    assert_eq!(messages.lock().unwrap().len(), 1);

    {
        let dismissed = Block::leaf(ScriptedSource { entries: Vec::new(), rejected: Arc::new(Mutex::new(Vec::new())) });
        dismissed.dismiss();
    }
    assert_eq!(messages.lock().unwrap().len(), 1);
}
