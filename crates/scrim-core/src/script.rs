//! Script records, their run state, and the registry that owns them.

use crate::config::{Config, ScriptConfig};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Mutable run state for one script, guarded by the record's lock.
/// Written only by apply closures running on the render-loop thread.
#[derive(Debug, Default)]
pub struct ScriptState {
    /// Completion time of the last successful load; `None` before the
    /// first one. The interval scheduler never fires while this is
    /// `None`.
    pub last_loaded: Option<Instant>,

    /// Lines captured by the most recent successful load.
    pub lines: Vec<String>,
}

/// One configured script and its run state. Lives for the process
/// lifetime, shared as `Arc<Script>` between the render loop and
/// execution tasks.
#[derive(Debug)]
pub struct Script {
    conf: ScriptConfig,
    running: AtomicBool,
    state: Mutex<ScriptState>,
}

impl Script {
    fn new(conf: ScriptConfig) -> Arc<Self> {
        Arc::new(Self {
            conf,
            running: AtomicBool::new(false),
            state: Mutex::new(ScriptState::default()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.conf.name
    }

    #[must_use]
    pub fn conf(&self) -> &ScriptConfig {
        &self.conf
    }

    /// Take the exclusive running claim. Returns `None` while another
    /// run holds it. The claim is released when the guard drops, on
    /// every exit path.
    pub fn try_claim(self: &Arc<Self>) -> Option<RunClaim> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunClaim {
                script: Arc::clone(self),
            })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Lock the run state.
    ///
    /// # Panics
    ///
    /// Panics if a previous holder panicked while holding the lock.
    pub fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().expect("script state lock poisoned")
    }

    /// Whether the script has never completed a load.
    #[must_use]
    pub fn never_loaded(&self) -> bool {
        self.state().last_loaded.is_none()
    }

    /// Snapshot of the cached lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.state().lines.clone()
    }
}

/// Exclusive marker preventing two concurrent executions of one script.
#[derive(Debug)]
pub struct RunClaim {
    script: Arc<Script>,
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.script.running.store(false, Ordering::Release);
    }
}

/// All configured scripts, in configuration order.
#[derive(Debug, Default)]
pub struct Registry {
    scripts: Vec<Arc<Script>>,
    by_name: HashMap<String, Arc<Script>>,
}

impl Registry {
    /// Build the registry from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for duplicate script names.
    pub fn from_config(conf: &Config) -> Result<Self> {
        let mut registry = Self::default();
        for sconf in &conf.scripts {
            if registry.by_name.contains_key(&sconf.name) {
                return Err(Error::Config(format!(
                    "duplicate script name {:?}",
                    sconf.name
                )));
            }
            let script = Script::new(sconf.clone());
            registry
                .by_name
                .insert(sconf.name.clone(), Arc::clone(&script));
            registry.scripts.push(script);
        }
        Ok(registry)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Script>> {
        self.by_name.get(name)
    }

    /// Scripts in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Script>> {
        self.scripts.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
