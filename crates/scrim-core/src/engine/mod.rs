//! Trigger-driven script refresh engine.
//!
//! Execution happens on short-lived spawned tasks, one per in-flight
//! run. Every mutation of script run state crosses back to the render
//! thread as an [`EngineEvent`], so no apply ever races a draw.

mod debounce;
pub(crate) mod runner;

pub use runner::QUERY_ENV;

use crate::script::{Registry, Script};
use crate::selection::Selection;
use crate::trigger::{DEFAULT_INPUT_DEBOUNCE, TriggerTable};
use crate::Error;
use debounce::DebounceState;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Closure applied to shared state on the render-loop thread.
pub type ApplyFn = Box<dyn FnOnce() + Send + 'static>;

/// Events the engine posts to the render loop. The loop drains them all
/// before recomputing the selection and drawing.
pub enum EngineEvent {
    /// Merge a completed run's result into script state. Runs on the
    /// render thread, never concurrently with a draw.
    Apply(ApplyFn),

    /// A stay-open selection finished; reload the script and its chain
    /// dependents.
    Refire { scripts: Vec<String>, query: String },

    /// An item invocation failed. The session continues.
    ItemRunFailed { script: String, error: Error },

    /// A load failed. The render loop unwinds with this error; the
    /// script's cached lines stay as they were.
    Fatal(Error),

    /// End the session normally.
    Quit,
}

impl std::fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apply(_) => f.write_str("Apply(..)"),
            Self::Refire { scripts, query } => f
                .debug_struct("Refire")
                .field("scripts", scripts)
                .field("query", query)
                .finish(),
            Self::ItemRunFailed { script, error } => f
                .debug_struct("ItemRunFailed")
                .field("script", script)
                .field("error", error)
                .finish(),
            Self::Fatal(error) => f.debug_tuple("Fatal").field(error).finish(),
            Self::Quit => f.write_str("Quit"),
        }
    }
}

/// How long a debounced run waits between attempts to take over the
/// claim of the run it superseded.
const CLAIM_RETRY: Duration = Duration::from_millis(10);

/// The concurrent script-refresh engine. Owned by the render loop;
/// spawned tasks only ever talk back through the event channel.
pub struct Engine {
    registry: Arc<Registry>,
    table: Arc<TriggerTable>,
    events: mpsc::UnboundedSender<EngineEvent>,
    shutdown: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    debounce: HashMap<String, DebounceState>,
}

impl Engine {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        table: Arc<TriggerTable>,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                table,
                events,
                shutdown: CancellationToken::new(),
                in_flight: Arc::new(AtomicUsize::new(0)),
                debounce: HashMap::new(),
            },
            rx,
        )
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn table(&self) -> &Arc<TriggerTable> {
        &self.table
    }

    /// Kick off loads for every `on-start` script.
    pub fn start_initial_loads(&self) {
        for name in self.table.on_start() {
            if let Some(script) = self.registry.get(name) {
                self.spawn_load(Arc::clone(script));
            }
        }
    }

    /// Load any active script that has never loaded. Idempotent for an
    /// unchanged query: once a load completes, `last_loaded` is set and
    /// the script is never scheduled from here again. Input-kind
    /// scripts are excluded; they only run through the debounce
    /// scheduler.
    pub fn ensure_loaded(&self, selection: &Selection) {
        for name in &selection.scripts {
            if self.table.is_input(name) {
                continue;
            }
            let Some(script) = self.registry.get(name) else {
                continue;
            };
            if script.never_loaded() && !script.is_running() {
                self.spawn_load(Arc::clone(script));
            }
        }
    }

    /// Reload one script immediately (manual refresh).
    pub fn reload(&self, name: &str) {
        if let Some(script) = self.registry.get(name) {
            self.spawn_load(Arc::clone(script));
        }
    }

    /// Reload stale visible scripts with interval triggers. A script
    /// that has never completed its first load is skipped, so the
    /// interval path cannot race the initial one.
    pub fn check_intervals(&self, visible: &[String]) {
        for name in visible {
            let Some(interval) = self.table.interval(name) else {
                continue;
            };
            let Some(script) = self.registry.get(name) else {
                continue;
            };
            let stale = script
                .state()
                .last_loaded
                .is_some_and(|at| at.elapsed() >= interval);
            if stale && !script.is_running() {
                debug!(script = name.as_str(), "interval elapsed, reloading");
                self.spawn_load(Arc::clone(script));
            }
        }
    }

    /// The effective query changed: restart the debounce window for
    /// every active input-kind script. The superseded window's run is
    /// cancelled even if it already started, so output never reflects
    /// an outdated query.
    pub fn query_changed(&mut self, selection: &Selection) {
        for name in &selection.scripts {
            let Some(delay) = self.table.input_delay(name) else {
                continue;
            };
            let Some(script) = self.registry.get(name) else {
                continue;
            };
            let script = Arc::clone(script);
            let state = self.debounce.entry(name.clone()).or_default();
            let (token, generation) = state.restart(&self.shutdown);
            let counter = state.generation_handle();
            spawn_debounced(
                script,
                selection.query.clone(),
                delay,
                token,
                counter,
                generation,
                self.events.clone(),
                Arc::clone(&self.in_flight),
            );
        }
    }

    /// Invoke the script with the selected line text. On success the
    /// session either quits or, for stay-open selections, the script's
    /// load and chain triggers re-fire.
    pub fn run_selected(&self, name: &str, item: String, query: String, stay_open: bool) {
        let Some(script) = self.registry.get(name) else {
            return;
        };
        let script = Arc::clone(script);
        let chained: Vec<String> = self.table.chained(name).to_vec();
        let events = self.events.clone();
        let token = self.shutdown.child_token();
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            {
                let Some(_claim) = script.try_claim() else {
                    debug!(script = script.name(), "item run skipped, already running");
                    return;
                };
                let _busy = BusyGuard::new(&in_flight);
                match runner::run_item(&script, &item, &query, &token, runner::RUN_TIMEOUT).await {
                    Ok(()) => {}
                    Err(Error::Cancelled) => return,
                    Err(error) => {
                        let _ = events.send(EngineEvent::ItemRunFailed {
                            script: script.name().to_string(),
                            error,
                        });
                        return;
                    }
                }
            }

            if stay_open {
                let mut scripts = Vec::with_capacity(chained.len() + 1);
                scripts.push(script.name().to_string());
                scripts.extend(chained);
                let _ = events.send(EngineEvent::Refire { scripts, query });
            } else {
                let _ = events.send(EngineEvent::Quit);
            }
        });
    }

    /// Re-fire after a stay-open selection. Chain targets that are
    /// input-kind reload immediately unless configured to re-enter
    /// their debounce window.
    pub fn refire(&mut self, names: &[String], query: &str) {
        for name in names {
            let Some(script) = self.registry.get(name) else {
                continue;
            };
            if self.table.is_input(name) && script.conf().chain_respects_debounce {
                let delay = self
                    .table
                    .input_delay(name)
                    .unwrap_or(DEFAULT_INPUT_DEBOUNCE);
                let script = Arc::clone(script);
                let state = self.debounce.entry(name.clone()).or_default();
                let (token, generation) = state.restart(&self.shutdown);
                let counter = state.generation_handle();
                spawn_debounced(
                    script,
                    query.to_string(),
                    delay,
                    token,
                    counter,
                    generation,
                    self.events.clone(),
                    Arc::clone(&self.in_flight),
                );
            } else {
                self.spawn_load(Arc::clone(script));
            }
        }
    }

    /// Whether any run is in flight (drives the spinner).
    #[must_use]
    pub fn busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Cancel every in-flight and pending run.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn spawn_load(&self, script: Arc<Script>) {
        tokio::spawn(load_task(
            script,
            None,
            None,
            self.events.clone(),
            self.shutdown.child_token(),
            Arc::clone(&self.in_flight),
        ));
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// Debounce windows and their runs outlive `&self` borrows, so the
// spawn helpers are free functions over owned handles.
#[allow(clippy::too_many_arguments)]
fn spawn_debounced(
    script: Arc<Script>,
    query: String,
    delay: Duration,
    token: CancellationToken,
    counter: Arc<AtomicU64>,
    generation: u64,
    events: mpsc::UnboundedSender<EngineEvent>,
    in_flight: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => return,
            () = sleep(delay) => {}
        }
        load_task(
            script,
            Some(query),
            Some((counter, generation)),
            events,
            token,
            in_flight,
        )
        .await;
    });
}

/// One load run: claim, execute, publish through the apply queue.
async fn load_task(
    script: Arc<Script>,
    query: Option<String>,
    generation: Option<(Arc<AtomicU64>, u64)>,
    events: mpsc::UnboundedSender<EngineEvent>,
    token: CancellationToken,
    in_flight: Arc<AtomicUsize>,
) {
    // A debounced run may fire while the run it superseded is still
    // being torn down; wait that claim out instead of dropping the
    // final query's run.
    let wait_for_claim = generation.is_some();
    let Some(_claim) = acquire_claim(&script, &token, wait_for_claim).await else {
        debug!(script = script.name(), "load skipped, already running");
        return;
    };
    let _busy = BusyGuard::new(&in_flight);

    match runner::capture_lines(&script, query.as_deref(), &token, runner::LOAD_TIMEOUT).await {
        Ok(lines) => {
            debug!(
                script = script.name(),
                num_lines = lines.len(),
                "loaded script"
            );
            let apply = Arc::clone(&script);
            let _ = events.send(EngineEvent::Apply(Box::new(move || {
                if let Some((counter, expected)) = generation
                    && counter.load(Ordering::SeqCst) != expected
                {
                    debug!(script = apply.name(), "discarding superseded load result");
                    return;
                }
                let mut state = apply.state();
                if !lines.is_empty() {
                    state.lines = lines;
                }
                state.last_loaded = Some(Instant::now());
            })));
        }
        Err(Error::Cancelled) => {}
        Err(e) => {
            let _ = events.send(EngineEvent::Fatal(e));
        }
    }
}

async fn acquire_claim(
    script: &Arc<Script>,
    token: &CancellationToken,
    wait: bool,
) -> Option<crate::script::RunClaim> {
    if let Some(claim) = script.try_claim() {
        return Some(claim);
    }
    if !wait {
        return None;
    }
    loop {
        tokio::select! {
            () = token.cancelled() => return None,
            () = sleep(CLAIM_RETRY) => {
                if let Some(claim) = script.try_claim() {
                    return Some(claim);
                }
            }
        }
    }
}

/// Increments the in-flight counter for the spinner; decrements on drop.
struct BusyGuard(Arc<AtomicUsize>);

impl BusyGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
