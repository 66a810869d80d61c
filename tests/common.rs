#![allow(dead_code)]

use std::cell::RefCell;

use rand_core::{RngCore, SeedableRng};

use raft::applier::CommittedBatch;
use raft::log::memory::InMemoryLog;
use raft::message::{LogEntry, NodeId};
use raft::network::{InMemoryNetwork, Network};
use raft::node::{Config, Node};
use rand_chacha::ChaChaRng;

pub const CONFIG: Config = Config {
    election_timeout_low_ticks: 10,
    election_timeout_high_ticks: 20,
    heartbeat_interval_ticks: 1,
};
const RANDOM_SEED: u64 = 0;
const MAX_TICKS: u32 = 100_000;

pub type TestNode = Node<InMemoryLog, ChaChaRng>;

pub struct TestRaftGroup {
    pub nodes: Vec<TestNode>,
    pub network: InMemoryNetwork<ChaChaRng>,
    pub tick: u32,
}

pub fn init_random() -> ChaChaRng {
    ChaChaRng::seed_from_u64(RANDOM_SEED)
}

impl TestRaftGroup {
    pub fn new(size: usize) -> Self {
        TestLogger::init();
        Self::with_config(size, CONFIG)
    }

    pub fn with_config(size: usize, config: Config) -> Self {
        TestLogger::init();
        let mut random = init_random();
        Self {
            nodes: (0..size)
                .map(|id| {
                    Node::new(
                        id,
                        size,
                        InMemoryLog::new_unbounded(),
                        ChaChaRng::seed_from_u64(random.next_u64()),
                        config,
                    )
                })
                .collect(),
            network: InMemoryNetwork::new(size, ChaChaRng::seed_from_u64(random.next_u64())),
            tick: 0,
        }
    }

    /// Disables delivery to/from `node_id` until [`heal`](Self::heal) or
    /// [`enable`](InMemoryNetwork::enable) is called.
    pub fn isolate(&mut self, node_id: NodeId) -> &mut Self {
        self.network.disable(node_id);
        self
    }

    pub fn heal(&mut self, node_id: NodeId) -> &mut Self {
        self.network.enable(node_id);
        self
    }

    fn step(&mut self) {
        self.tick += 1;
        for node in &mut self.nodes {
            let node_id = node.node_id();
            TestLogger::set_node_id(Some(node_id));
            TestLogger::set_tick(Some(self.tick));
            node.tick();
            while let Some(message) = self.network.recv(node_id) {
                node.enqueue_message(message);
            }
            node.take_outgoing().for_each(|message| self.network.send(message));
        }
        TestLogger::set_node_id(None);
        TestLogger::set_tick(None);
    }

    pub fn run_for(&mut self, ticks: u32) -> &mut Self {
        self.run_for_inspect(ticks, |_| ())
    }

    pub fn run_for_inspect(&mut self, ticks: u32, mut fun: impl FnMut(&mut Self)) -> &mut Self {
        for _ in 0..ticks {
            self.step();
            fun(self);
        }
        self
    }

    pub fn run_until(&mut self, mut until_fun: impl FnMut(&mut Self) -> bool) -> &mut Self {
        let mut ticks_remaining = MAX_TICKS;
        while !until_fun(self) {
            ticks_remaining = ticks_remaining
                .checked_sub(1)
                .expect("condition failed after maximum simulation length");
            self.step();
        }
        self
    }

    pub fn run_until_commit(&mut self, mut until_fun: impl FnMut(&LogEntry) -> bool) -> &mut Self {
        self.run_until(|group| {
            let result = group
                .take_committed()
                .any(|entry| !entry.data.is_empty() && until_fun(&entry));
            group.take_committed().for_each(drop);
            result
        })
    }

    pub fn leader(&self) -> Option<usize> {
        self.nodes.iter().position(|node| node.is_leader())
    }

    pub fn has_leader(&self) -> bool {
        self.leader().is_some()
    }

    pub fn submit_on_leader(&mut self, data: &'static str) -> bool {
        match self.leader() {
            Some(leader) => self.nodes[leader].submit(data).is_ok(),
            None => false,
        }
    }

    pub fn take_committed(&mut self) -> impl Iterator<Item = LogEntry> + '_ {
        self.nodes.iter_mut().flat_map(|node| {
            node.take_committed()
                .collect::<Vec<CommittedBatch>>()
                .into_iter()
                .flat_map(|batch| batch.entries)
        })
    }
}

//
// TestLogger impls
//

pub struct TestLogger;

struct TestLoggerContext {
    node_id: Option<NodeId>,
    tick: Option<u32>,
}

thread_local! {
    static LOGGER_CONTEXT: RefCell<TestLoggerContext> = RefCell::new(TestLoggerContext { node_id: None, tick: None });
}

impl TestLogger {
    pub fn init() {
        let _ignore = log::set_logger(&Self);
        log::set_max_level(log::LevelFilter::Debug);
    }

    pub fn set_node_id(node_id: Option<NodeId>) {
        LOGGER_CONTEXT.with(|context| context.borrow_mut().node_id = node_id);
    }

    pub fn set_tick(tick: Option<u32>) {
        LOGGER_CONTEXT.with(|context| context.borrow_mut().tick = tick);
    }
}

impl log::Log for TestLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        LOGGER_CONTEXT.with(|context| {
            let context = context.borrow();
            match (context.node_id, context.tick) {
                (Some(node_id), Some(tick)) => {
                    eprintln!("tick {:03} {} {}", tick, node_id, record.args())
                }
                (Some(node_id), None) => eprintln!("tick ??? {} {}", node_id, record.args()),
                _ => eprintln!("{}", record.args()),
            }
        })
    }

    fn flush(&self) {}
}
