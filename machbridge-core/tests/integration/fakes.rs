//! Scripted stand-ins for the injected remote capabilities

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use machbridge_core::{CommandExecutor, CommandResult, Pinger};

/// Command executor answering from a test-provided closure while
/// recording every command it was asked to run
pub struct ScriptedExecutor {
    calls: Mutex<Vec<String>>,
    respond: Box<dyn Fn(&str) -> CommandResult<String> + Send + Sync>,
}

impl ScriptedExecutor {
    pub fn new(respond: impl Fn(&str) -> CommandResult<String> + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Number of recorded commands starting with the given prefix
    pub fn count_calls(&self, prefix: &str) -> usize {
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
pub struct FakePinger {
    alive: AtomicBool,
}

impl FakePinger {
    pub fn new(alive: bool) -> Self {
        Self {
            alive: AtomicBool::new(alive),
        }
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }
}

#[async_trait]
impl Pinger for FakePinger {
    async fn probe(&self, _host: &str) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}
