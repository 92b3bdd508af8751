//! Named debug sessions over copy-on-write ledger snapshots.
//!
//! Every session owns a snapshot layered over the chain state (or over another
//! session's state when copied) and, while a debug invocation is in progress, a
//! suspended engine. Sessions are created implicitly on first use.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::Snapshot;
use crate::vm::{EngineFactory, ExecutionEngine, VmState};
use crate::{DebuggerError, Result};

/// Values an engine reports instead of the real chain context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOverrides {
    /// Block timestamp in milliseconds.
    pub timestamp: Option<u64>,
}

/// A debug invocation paused between steps.
pub struct SuspendedDebug<E> {
    pub engine: E,
    writeback: bool,
    committed: bool,
}

impl<E> SuspendedDebug<E> {
    pub fn writeback(&self) -> bool {
        self.writeback
    }
}

/// One named session.
pub struct DebugSession<E> {
    name: String,
    snapshot: Arc<Snapshot>,
    pub overrides: RuntimeOverrides,
    suspended: Option<SuspendedDebug<E>>,
}

impl<E: ExecutionEngine> DebugSession<E> {
    fn new(name: impl Into<String>, base: &Arc<Snapshot>, overrides: RuntimeOverrides) -> Self {
        Self {
            name: name.into(),
            snapshot: Arc::new(Snapshot::fork_shared(base)),
            overrides,
            suspended: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// A private layer over the session state for a new engine.
    pub fn fork(&self) -> Snapshot {
        Snapshot::fork_shared(&self.snapshot)
    }

    /// Apply the top layer of an engine's snapshot to the session state.
    pub fn write_back(&mut self, engine_snapshot: &Snapshot) {
        let mut next = (*self.snapshot).clone();
        engine_snapshot.clone().commit_into(&mut next);
        self.snapshot = Arc::new(next);
        debug!(session = %self.name, "wrote engine state back into session");
    }

    /// Install a new suspended engine, dropping any previous one.
    pub fn begin_debug(&mut self, engine: E, writeback: bool) {
        if self.suspended.is_some() {
            debug!(session = %self.name, "superseding suspended debug invocation");
        }
        self.suspended = Some(SuspendedDebug {
            engine,
            writeback,
            committed: false,
        });
    }

    pub fn suspended(&self) -> Result<&SuspendedDebug<E>> {
        self.suspended
            .as_ref()
            .ok_or_else(|| DebuggerError::NoDebugInProgress(self.name.clone()).into())
    }

    pub fn suspended_mut(&mut self) -> Result<&mut SuspendedDebug<E>> {
        self.suspended
            .as_mut()
            .ok_or_else(|| DebuggerError::NoDebugInProgress(self.name.clone()).into())
    }

    /// Commit a halted writeback invocation, at most once.
    pub fn settle(&mut self) {
        let Some(suspended) = self.suspended.as_mut() else {
            return;
        };
        if !suspended.writeback || suspended.committed || suspended.engine.state() != VmState::Halt
        {
            return;
        }
        suspended.committed = true;
        let engine_snapshot = suspended.engine.snapshot().clone();
        self.write_back(&engine_snapshot);
    }
}

type SessionHandle<E> = Arc<Mutex<DebugSession<E>>>;

/// Session store plus the engine factory used to build engines for it.
pub struct SessionManager<F: EngineFactory> {
    factory: F,
    /// Overrides new sessions start with.
    defaults: RuntimeOverrides,
    chain: Arc<Snapshot>,
    sessions: RwLock<HashMap<String, SessionHandle<F::Engine>>>,
}

impl<F: EngineFactory> SessionManager<F> {
    pub fn new(factory: F, chain: Snapshot, defaults: RuntimeOverrides) -> Self {
        Self {
            factory,
            defaults,
            chain: Arc::new(chain),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Current chain state sessions are forked from.
    pub fn chain(&self) -> Arc<Snapshot> {
        Arc::clone(&self.chain)
    }

    /// Get a session, creating it from the chain state if it does not exist.
    pub fn session(&self, name: &str) -> SessionHandle<F::Engine> {
        if let Some(session) = self.sessions.read().get(name) {
            return Arc::clone(session);
        }
        let chain = self.chain();
        let mut sessions = self.sessions.write();
        let session = sessions.entry(name.to_string()).or_insert_with(|| {
            info!(session = name, "created session");
            Arc::new(Mutex::new(DebugSession::new(
                name,
                &chain,
                self.defaults.clone(),
            )))
        });
        Arc::clone(session)
    }

    /// Get a session that must already exist.
    pub fn existing(&self, name: &str) -> Result<SessionHandle<F::Engine>> {
        self.sessions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DebuggerError::SessionNotFound(name.to_string()).into())
    }

    /// (Re)create sessions from the current chain state, discarding prior state.
    pub fn new_sessions_from_chain(&self, names: &[String]) -> Vec<String> {
        let chain = self.chain();
        let mut sessions = self.sessions.write();
        for name in names {
            sessions.insert(
                name.clone(),
                Arc::new(Mutex::new(DebugSession::new(
                    name.as_str(),
                    &chain,
                    self.defaults.clone(),
                ))),
            );
            info!(session = %name, "reset session from chain");
        }
        names.to_vec()
    }

    /// Reports per name whether a session existed.
    pub fn delete_sessions(&self, names: &[String]) -> BTreeMap<String, bool> {
        let mut sessions = self.sessions.write();
        names
            .iter()
            .map(|name| {
                let existed = sessions.remove(name).is_some();
                if existed {
                    info!(session = %name, "deleted session");
                }
                (name.clone(), existed)
            })
            .collect()
    }

    pub fn list_sessions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn rename_session(&self, from: &str, to: &str) -> Result<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(to) {
            return Err(DebuggerError::SessionExists(to.to_string()).into());
        }
        let session = sessions
            .remove(from)
            .ok_or_else(|| DebuggerError::SessionNotFound(from.to_string()))?;
        session.lock().name = to.to_string();
        sessions.insert(to.to_string(), session);
        info!(from, to, "renamed session");
        Ok(())
    }

    /// Fork `from` into a new session `to`. The suspended engine is not copied.
    pub fn copy_session(&self, from: &str, to: &str) -> Result<()> {
        let source = self.existing(from)?;
        let copy = {
            let source = source.lock();
            DebugSession::new(to, &source.snapshot, source.overrides.clone())
        };
        let mut sessions = self.sessions.write();
        if sessions.contains_key(to) {
            return Err(DebuggerError::SessionExists(to.to_string()).into());
        }
        sessions.insert(to.to_string(), Arc::new(Mutex::new(copy)));
        info!(from, to, "copied session");
        Ok(())
    }

    pub fn set_session_timestamp(&self, name: &str, timestamp: Option<u64>) {
        self.session(name).lock().overrides.timestamp = timestamp;
    }

    pub fn get_session_timestamp(&self, names: &[String]) -> BTreeMap<String, Option<u64>> {
        names
            .iter()
            .map(|name| (name.clone(), self.session(name).lock().overrides.timestamp))
            .collect()
    }
}
