pub mod config;
pub mod engine;

mod error;
mod line;
mod script;
mod selection;
mod trigger;

#[cfg(test)]
mod tests;

pub use engine::{Engine, EngineEvent, QUERY_ENV};
pub use error::{Error, Result};
pub use line::{LineStyle, display_text, line_matches, strip_directives};
pub use script::{Registry, RunClaim, Script, ScriptState};
pub use selection::{Selection, resolve};
pub use trigger::{DEFAULT_INPUT_DEBOUNCE, TriggerKind, TriggerTable};
