//! Shared fakes for exercising managers without a network

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::command::{CommandExecutor, CommandResult};
use crate::probe::Pinger;

/// Command executor answering from a test-provided closure while
/// recording every command it was asked to run
pub(crate) struct ScriptedExecutor {
    calls: Mutex<Vec<String>>,
    respond: Box<dyn Fn(&str) -> CommandResult<String> + Send + Sync>,
}

impl ScriptedExecutor {
    pub(crate) fn new(
        respond: impl Fn(&str) -> CommandResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Commands run so far, in order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded commands starting with the given prefix
    pub(crate) fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, command: &str) -> CommandResult<String> {
        self.calls.lock().unwrap().push(command.to_string());
        (self.respond)(command)
    }
}

/// Pinger whose reachability answer is flipped by the test
pub(crate) struct FakePinger {
    alive: AtomicBool,
    probes: AtomicUsize,
}

impl FakePinger {
    pub(crate) fn new(alive: bool) -> Self {
        Self {
            alive: AtomicBool::new(alive),
            probes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Number of probes answered so far
    pub(crate) fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pinger for FakePinger {
    async fn probe(&self, _host: &str) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.alive.load(Ordering::SeqCst)
    }
}
