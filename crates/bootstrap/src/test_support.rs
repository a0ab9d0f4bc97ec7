//! Recording fakes for the subprocess and backend boundaries

use async_trait::async_trait;
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use devstack_common::{Error, Result};

use crate::backend::{BackendLauncher, ChildProcess, LaunchSpec};
use crate::command::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Run,
    Capture,
    Status,
}

/// One recorded subprocess invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub program: String,
    pub args: Vec<String>,
}

impl Call {
    /// First argument, e.g. `run`, `rm`, `exec`
    pub fn verb(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

/// Scripted outcome of a call
#[derive(Debug, Clone)]
pub enum Reply {
    Output(String),
    Fail,
}

type Responder = dyn Fn(&Call) -> Reply + Send + Sync;

/// [`CommandRunner`] that records every call and answers from a script
#[derive(Clone)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<Call>>>,
    responder: Arc<Responder>,
}

impl RecordingRunner {
    /// Every call succeeds with empty output
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(|_| Reply::Output(String::new())),
        }
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&Call) -> Reply + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Verbs of every call, in order
    pub fn verbs(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.verb().to_string()).collect()
    }

    fn record(&self, kind: CallKind, program: &str, args: &[String]) -> Reply {
        let call = Call {
            kind,
            program: program.to_string(),
            args: args.to_vec(),
        };
        let reply = (self.responder)(&call);
        self.calls.lock().push(call);
        reply
    }
}

fn failed(program: &str, args: &[String]) -> Error {
    Error::command_failed(program, args, "exit status: 1", None)
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<()> {
        match self.record(CallKind::Run, program, args) {
            Reply::Output(_) => Ok(()),
            Reply::Fail => Err(failed(program, args)),
        }
    }

    async fn capture(&self, program: &str, args: &[String]) -> Result<String> {
        match self.record(CallKind::Capture, program, args) {
            Reply::Output(out) => Ok(out),
            Reply::Fail => Err(failed(program, args)),
        }
    }

    async fn status(&self, program: &str, args: &[String]) -> Result<bool> {
        match self.record(CallKind::Status, program, args) {
            Reply::Output(_) => Ok(true),
            Reply::Fail => Ok(false),
        }
    }
}

/// Child whose exit is triggered by the test
pub struct FakeChild {
    pub signals: Arc<Mutex<Vec<Signal>>>,
    pub fail_signals: bool,
    exit: Option<oneshot::Receiver<Option<i32>>>,
}

impl FakeChild {
    /// Returns the child and the sender that makes it exit with a code
    pub fn new() -> (Self, oneshot::Sender<Option<i32>>) {
        let (tx, rx) = oneshot::channel();
        let child = Self {
            signals: Arc::new(Mutex::new(Vec::new())),
            fail_signals: false,
            exit: Some(rx),
        };
        (child, tx)
    }
}

#[async_trait]
impl ChildProcess for FakeChild {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        self.signals.lock().push(signal);
        if self.fail_signals {
            return Err(Error::Backend("process has already exited".to_string()));
        }
        Ok(())
    }

    // cancel-safe: the receiver survives a dropped wait future
    async fn wait(&mut self) -> Result<Option<i32>> {
        let code = match self.exit.as_mut() {
            Some(rx) => rx.await.unwrap_or(None),
            None => return Err(Error::Backend("already waited".to_string())),
        };
        self.exit = None;
        Ok(code)
    }
}

/// Launcher that records each `LaunchSpec` and hands out a prepared child
#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub launched: Arc<Mutex<Vec<LaunchSpec>>>,
    child: Arc<Mutex<Option<FakeChild>>>,
}

impl FakeLauncher {
    pub fn with_child(child: FakeChild) -> Self {
        Self {
            launched: Arc::new(Mutex::new(Vec::new())),
            child: Arc::new(Mutex::new(Some(child))),
        }
    }
}

impl BackendLauncher for FakeLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ChildProcess>> {
        self.launched.lock().push(spec.clone());
        match self.child.lock().take() {
            Some(child) => Ok(Box::new(child)),
            None => Err(Error::Backend("no child prepared".to_string())),
        }
    }
}
