use cstack_engine::EngineEvent;
use cstack_model::{ArgumentInfo, ArgumentType, CommandInfo, ParameterValue, StepOutput};
use cstack_session::prelude::*;
use cstack_test_utils::{ScriptedIssuer, StaticLookup, QUEUED, SAMPLE_XML, THREE_STEP_YCS};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const BUCKET: &str = "stacks";

async fn load(storage: Arc<MemoryStorage>, name: &str) -> StackSession {
    let mut session = StackSession::new(SessionConfig::default(), storage);
    session.load(name).await.unwrap();
    session
}

fn runtime(session: StackSession, issuer: &Arc<ScriptedIssuer>) -> SessionRuntime {
    let runtime = SessionRuntime::new(session, issuer.clone());
    issuer.connect(runtime.sender());
    runtime
}

fn outputs(runtime: &SessionRuntime) -> Vec<StepOutput> {
    runtime
        .session()
        .steps()
        .iter()
        .map(|s| s.output().clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn three_step_stack_halts_on_nok() {
    let storage = Arc::new(MemoryStorage::new().with_object(BUCKET, "e2e.ycs", THREE_STEP_YCS));
    let session = load(storage, "e2e.ycs").await;
    let issuer = Arc::new(
        ScriptedIssuer::new()
            .acknowledge("/CMD_A", QUEUED, "OK")
            .acknowledge("/CMD_C", QUEUED, "NOK"),
    );
    let mut runtime = runtime(session, &issuer);

    runtime
        .sender()
        .send(EngineEvent::ParametersUpdated(vec![(
            "/P1".to_string(),
            ParameterValue::new(42),
        )]))
        .unwrap();
    runtime.next_event().await;

    runtime.run_from_selection().unwrap();
    runtime.run_until_idle().await;

    assert_eq!(issuer.issued_names(), vec!["/CMD_A", "/CMD_C"]);
    let out = outputs(&runtime);
    assert_eq!(out[0].id.as_ref().map(|id| id.as_str()), Some("cmd-1"));
    assert!(!out[0].is_failed());
    assert_eq!(out[1].snapshot[0].value, Some(ParameterValue::new(42)));
    assert_eq!(out[2].halted_on.as_deref(), Some(QUEUED));
    assert!(out[2].err.is_none());

    let third = runtime.session().steps()[2].key();
    assert_eq!(runtime.session().selection(), Some(third));
    assert!(out.iter().all(|o| !o.executing));
}

#[tokio::test(start_paused = true)]
async fn stop_during_delay_prevents_advancement() {
    let ycs = r#"{
        "steps": [{"type": "command", "name": "/A"}, {"type": "text", "text": "after"}],
        "advancement": {"acknowledgment": "Acknowledge_Queued", "wait": 1000}
    }"#;
    let storage = Arc::new(MemoryStorage::new().with_object(BUCKET, "delay.ycs", ycs));
    let session = load(storage, "delay.ycs").await;
    let issuer = Arc::new(ScriptedIssuer::new().acknowledge("/A", QUEUED, "OK"));
    let mut runtime = runtime(session, &issuer);
    let first = runtime.session().steps()[0].key();

    runtime.run_from_selection().unwrap();
    while !runtime.session().engine().machine().is_continuing() {
        runtime.next_event().await;
    }
    runtime.stop_run();

    let late = tokio::time::timeout(Duration::from_secs(5), runtime.next_event()).await;
    assert!(late.is_err(), "no event may arrive after stop");
    assert_eq!(runtime.session().selection(), Some(first));
    assert!(!runtime.session().engine().is_running());
}

#[tokio::test(start_paused = true)]
async fn issuance_failure_stops_continuous_run() {
    let storage = Arc::new(MemoryStorage::new().with_object(BUCKET, "e2e.ycs", THREE_STEP_YCS));
    let session = load(storage, "e2e.ycs").await;
    let issuer = Arc::new(ScriptedIssuer::new().fail("/CMD_A", "Insufficient privileges"));
    let mut runtime = runtime(session, &issuer);

    runtime.run_from_selection().unwrap();
    runtime.run_until_idle().await;

    assert_eq!(issuer.issued_names(), vec!["/CMD_A"]);
    let out = outputs(&runtime);
    assert_eq!(out[0].err.as_deref(), Some("Insufficient privileges"));
    assert!(!out[1].has_outputs());
}

#[tokio::test(start_paused = true)]
async fn verify_step_times_out() {
    let ycs = r#"{"steps": [
        {"type": "verify", "condition": [{"parameter": "/T", "operator": "gte", "value": 30}],
         "delay": 100, "timeout": 400},
        {"type": "text", "text": "unreached"}
    ]}"#;
    let storage = Arc::new(MemoryStorage::new().with_object(BUCKET, "v.ycs", ycs));
    let session = load(storage, "v.ycs").await;
    let issuer = Arc::new(ScriptedIssuer::new());
    let mut runtime = runtime(session, &issuer);

    runtime.run_from_selection().unwrap();
    runtime
        .sender()
        .send(EngineEvent::ParametersUpdated(vec![(
            "/T".to_string(),
            ParameterValue::new(12),
        )]))
        .unwrap();
    runtime.run_until_idle().await;

    let out = outputs(&runtime);
    assert_eq!(
        out[0].err.as_deref(),
        Some("condition not satisfied within 400 ms")
    );
    assert!(!out[1].has_outputs());
}

#[tokio::test(start_paused = true)]
async fn verify_step_continues_when_condition_holds() {
    let ycs = r#"{"steps": [
        {"type": "verify", "condition": [{"parameter": "/T", "operator": "gte", "value": 30}],
         "timeout": 10000},
        {"type": "text", "text": "reached"}
    ]}"#;
    let storage = Arc::new(MemoryStorage::new().with_object(BUCKET, "v.ycs", ycs));
    let session = load(storage, "v.ycs").await;
    let issuer = Arc::new(ScriptedIssuer::new());
    let mut runtime = runtime(session, &issuer);

    runtime.run_from_selection().unwrap();
    runtime
        .sender()
        .send(EngineEvent::ParametersUpdated(vec![(
            "/T".to_string(),
            ParameterValue::new(31),
        )]))
        .unwrap();
    runtime.run_until_idle().await;

    let out = outputs(&runtime);
    assert!(out[0].err.is_none());
    assert!(out[1].has_outputs());
    assert_eq!(runtime.session().selection(), None);
}

#[tokio::test]
async fn xml_conversion_writes_ycs_then_deletes_original() {
    let storage = Arc::new(MemoryStorage::new().with_object(BUCKET, "ops/pass.xml", SAMPLE_XML));
    let mut session = load(storage.clone(), "ops/pass.xml").await;
    let before = session.steps().to_vec();

    let target = session.convert_to_ycs().await.unwrap();

    assert_eq!(target, "ops/pass.ycs");
    assert_eq!(storage.names(BUCKET), vec!["ops/pass.ycs"]);
    assert_eq!(session.object_name(), Some("ops/pass.ycs"));

    let reloaded = load(storage, "ops/pass.ycs").await;
    assert_eq!(reloaded.steps(), before.as_slice());
    assert_eq!(reloaded.advancement(), &SessionConfig::default().advancement);
}

#[tokio::test]
async fn conversion_saves_pending_edits_first() {
    let storage = Arc::new(MemoryStorage::new().with_object(BUCKET, "pass.xml", SAMPLE_XML));
    let mut session = load(storage.clone(), "pass.xml").await;
    session.delete_selected().unwrap();
    assert!(session.is_dirty());

    session.convert_to_ycs().await.unwrap();

    let reloaded = load(storage, "pass.ycs").await;
    assert_eq!(reloaded.steps().len(), 1);
    assert!(!session.is_dirty());
}

#[tokio::test]
async fn enrichment_tolerates_unknown_commands() {
    let storage = Arc::new(MemoryStorage::new().with_object(BUCKET, "pass.xml", SAMPLE_XML));
    let info = CommandInfo::new("/YSS/SIMULATOR/SWITCH_VOLTAGE_ON").with_argument(
        ArgumentInfo::new("voltage_num", ArgumentType::new("integer")),
    );
    let lookup = Arc::new(StaticLookup::new().with_command(info));

    let mut session = StackSession::new(SessionConfig::default(), storage).with_lookup(lookup);
    session.load("pass.xml").await.unwrap();

    assert!(session.steps()[0].command_info().is_some());
    assert!(session.steps()[1].command_info().is_none());
    assert_eq!(session.steps().len(), 2);
}

#[tokio::test]
async fn filesystem_storage_backs_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FsStorage::new(dir.path()));
    let mut session = StackSession::new(SessionConfig::default(), storage.clone());

    session.create("new.ycs").unwrap();
    session.insert(cstack_model::Step::text("# Title")).unwrap();
    session.save().await.unwrap();
    assert!(dir.path().join("stacks/new.ycs").exists());

    let mut reopened = StackSession::new(SessionConfig::default(), storage);
    reopened.load("new.ycs").await.unwrap();
    assert_eq!(reopened.headings()[0].as_deref(), Some("# 1 Title"));
}
