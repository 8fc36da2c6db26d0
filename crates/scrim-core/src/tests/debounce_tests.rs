//! Debounce scheduler tests: only the final stable query's run may ever
//! reach script state.

use crate::config::ScriptConfig;
use crate::engine::{Engine, EngineEvent};
use crate::script::Registry;
use crate::selection::Selection;
use crate::tests::fixtures::{config_of, script_conf, write_script};
use crate::trigger::TriggerTable;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn input_conf(dir: &Path, name: &str, body: &str, delay: &str) -> ScriptConfig {
    let trigger = format!("input {delay}");
    let mut sconf = script_conf(name, &[trigger.as_str()]);
    sconf.path = write_script(dir, &format!("{name}.sh"), body);
    sconf
}

fn engine_for(scripts: Vec<ScriptConfig>) -> (Engine, UnboundedReceiver<EngineEvent>) {
    let conf = config_of(scripts);
    let registry = Arc::new(Registry::from_config(&conf).unwrap());
    let table = Arc::new(TriggerTable::from_config(&conf).unwrap());
    Engine::new(registry, table)
}

fn selection(name: &str, query: &str) -> Selection {
    Selection {
        scripts: vec![name.to_string()],
        query: query.to_string(),
    }
}

async fn recv_apply(rx: &mut UnboundedReceiver<EngineEvent>) -> Box<dyn FnOnce() + Send> {
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no engine event within 5s")
        .expect("engine channel closed");
    match event {
        EngineEvent::Apply(apply) => apply,
        other => panic!("expected Apply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_final_query_wins() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, mut rx) = engine_for(vec![input_conf(
        dir.path(),
        "search",
        "echo \"$SCRIM_QUERY\"",
        "100ms",
    )]);
    let script = Arc::clone(engine.registry().get("search").unwrap());

    engine.query_changed(&selection("search", "a"));
    engine.query_changed(&selection("search", "ab"));

    let apply = recv_apply(&mut rx).await;
    apply();

    assert_eq!(script.lines(), ["ab"]);
    // The superseded window produced nothing
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rapid_changes_collapse_to_one_run() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let body = format!("echo run >> {}\necho \"$SCRIM_QUERY\"", marker.display());
    let (mut engine, mut rx) = engine_for(vec![input_conf(dir.path(), "search", &body, "100ms")]);

    for query in ["a", "ab", "abc"] {
        engine.query_changed(&selection("search", query));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let apply = recv_apply(&mut rx).await;
    apply();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        std::fs::read_to_string(&marker).unwrap().lines().count(),
        1
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_stale_generation_discarded_at_apply_time() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, mut rx) = engine_for(vec![input_conf(
        dir.path(),
        "search",
        "echo \"$SCRIM_QUERY\"",
        "50ms",
    )]);
    let script = Arc::clone(engine.registry().get("search").unwrap());

    engine.query_changed(&selection("search", "old"));
    // Let the first run complete before superseding it
    let stale_apply = recv_apply(&mut rx).await;

    engine.query_changed(&selection("search", "new"));

    // Applying the completed-but-superseded result must be a no-op
    stale_apply();
    assert!(script.lines().is_empty());

    let apply = recv_apply(&mut rx).await;
    apply();
    assert_eq!(script.lines(), ["new"]);
}

#[tokio::test]
async fn test_running_query_cancelled_by_new_change() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    // First run starts and hangs; the change must kill it
    let body = format!(
        "if [ \"$SCRIM_QUERY\" = slow ]; then sleep 30; fi\necho \"$SCRIM_QUERY\" >> {m}\necho \"$SCRIM_QUERY\"",
        m = marker.display()
    );
    let (mut engine, mut rx) = engine_for(vec![input_conf(dir.path(), "search", &body, "50ms")]);
    let script = Arc::clone(engine.registry().get("search").unwrap());

    engine.query_changed(&selection("search", "slow"));
    // Wait until the slow run is executing
    tokio::time::sleep(Duration::from_millis(300)).await;

    engine.query_changed(&selection("search", "fast"));

    let apply = recv_apply(&mut rx).await;
    apply();
    assert_eq!(script.lines(), ["fast"]);
    assert_eq!(std::fs::read_to_string(&marker).unwrap(), "fast\n");
}
