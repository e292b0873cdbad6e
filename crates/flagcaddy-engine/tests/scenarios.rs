//! End-to-end behavior of recorder, engine, and store together.

mod common;

use std::io::Write;
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;

use flagcaddy_engine::{
    DisabledAdvisor, GateDecision, RecommendationEngine, RegexFactExtractor, ADVISORY_TITLE,
};
use flagcaddy_ledger::{RecordStore, SqliteStore};
use flagcaddy_pilot::{start_with_io, EventSink, SessionRecorder};
use flagcaddy_types::{CaptureConfig, FactKind, RecommendationSource, DEFAULT_SENTINEL};

use common::*;

fn facts_of(engine: &RecommendationEngine, kind: FactKind) -> Vec<String> {
    engine
        .store()
        .list_facts(engine.session_id(), Some(kind))
        .unwrap()
        .into_iter()
        .map(|f| f.value)
        .collect()
}

fn recs_from(engine: &RecommendationEngine, source: RecommendationSource) -> Vec<String> {
    engine
        .store()
        .list_recommendations(Some(engine.session_id()), 100)
        .unwrap()
        .into_iter()
        .filter(|r| r.source == source)
        .map(|r| r.title)
        .collect()
}

#[test]
fn nmap_scan_yields_services_and_http_rule() {
    let mut engine = disabled_engine();
    let processed = engine.process(&captured(NMAP_COMMAND, NMAP_OUTPUT)).unwrap();

    assert!(!processed.duplicate);
    assert!(processed.new_facts >= 3);
    assert_eq!(facts_of(&engine, FactKind::Service), vec!["22/tcp/ssh", "80/tcp/http"]);
    assert!(facts_of(&engine, FactKind::Host).contains(&"10.10.10.5".to_string()));
    assert_eq!(
        recs_from(&engine, RecommendationSource::Rule),
        vec!["Enumerate HTTP surface"]
    );
}

#[test]
fn repeated_event_is_duplicate_with_lower_novelty() {
    let mut engine = disabled_engine();
    let first = engine.process(&captured(NMAP_COMMAND, NMAP_OUTPUT)).unwrap();
    let second = engine.process(&captured(NMAP_COMMAND, NMAP_OUTPUT)).unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert!(second.novelty < first.novelty);
    assert!(second.novelty <= 0.9);
    assert_eq!(second.new_facts, 0);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_ne!(first.event_id, second.event_id);

    let events = engine.store().list_events(engine.session_id(), 10).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[1].duplicate);
}

#[test]
fn same_scan_against_another_target_is_duplicate() {
    let mut engine = disabled_engine();
    engine.process(&captured("nmap -sV target", NMAP_OUTPUT)).unwrap();
    let other = NMAP_OUTPUT.replace("10.10.10.5", "10.10.10.77");
    let processed = engine.process(&captured("nmap -sV target", &other)).unwrap();
    assert!(processed.duplicate);
    // the new address is still a new fact
    assert_eq!(processed.new_facts, 1);
}

#[test]
fn disabled_advisor_never_creates_llm_recommendations() {
    let mut engine = disabled_engine();
    let outputs = [
        ("cat creds.txt", "password: hunter2\nHTB{s3cr3t_fl4g}\n"),
        (NMAP_COMMAND, NMAP_OUTPUT),
        ("sqlmap -u http://10.10.10.5/?id=1", "parameter 'id' is injectable"),
    ];
    for (command, output) in outputs {
        let processed = engine.process(&captured(command, output)).unwrap();
        assert!(processed.novelty >= 0.9);
        assert_eq!(processed.gate, GateDecision::Disabled);
    }
    assert!(recs_from(&engine, RecommendationSource::Llm).is_empty());
    assert!(!recs_from(&engine, RecommendationSource::Rule).is_empty());
}

#[test]
fn flushed_command_without_sentinel_becomes_one_event() {
    let mut engine = disabled_engine();
    let mut recorder = SessionRecorder::new(DEFAULT_SENTINEL, 4);

    recorder.handle_input(b"id\r");
    assert!(recorder.handle_output(b"id\r\nuid=0(root) gid=0(root)\r\n").is_none());
    let event = recorder.flush().expect("pending command is flushed");
    engine.on_event(event);
    assert!(recorder.flush().is_none());

    let events = engine.store().list_events(engine.session_id(), 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].command, "id");
    assert!(events[0].output.contains("uid=0(root)"));
}

#[test]
fn sentinel_in_prompt_finalizes_through_engine() {
    let mut engine = disabled_engine();
    let mut recorder = SessionRecorder::new(DEFAULT_SENTINEL, 4);

    recorder.handle_input(NMAP_COMMAND.as_bytes());
    recorder.handle_input(b"\r");
    assert!(recorder.handle_output(NMAP_OUTPUT.as_bytes()).is_none());
    let prompt = format!("kali@box:~$ {DEFAULT_SENTINEL}");
    let event = recorder
        .handle_output(prompt.as_bytes())
        .expect("sentinel closes the event");
    assert!(!event.output.contains(DEFAULT_SENTINEL));
    engine.on_event(event);

    assert_eq!(facts_of(&engine, FactKind::Service).len(), 2);
}

#[test]
fn pty_session_without_prompt_is_flushed_into_engine() {
    let mut engine = disabled_engine();
    let (reader, mut writer) = UnixStream::pair().unwrap();
    writer.write_all(b"hello flagcaddy\n").unwrap();
    drop(writer);

    let capture = CaptureConfig {
        sentinel: "<<never-printed>>".into(),
        ..CaptureConfig::default()
    };
    let mut output = Vec::new();
    let code = start_with_io(
        &capture,
        &session(),
        &["/bin/cat".to_string()],
        reader.as_fd(),
        &mut output,
        &mut engine,
    )
    .unwrap();

    assert_eq!(code, 0);
    let events = engine.store().list_events(engine.session_id(), 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].command, "hello flagcaddy");
}

#[test]
fn advisory_respects_cooldown() {
    let advisor = ScriptedAdvisor::replying("Run gobuster against port 80.");
    let mut engine = engine_with(Box::new(advisor.clone()), settings());

    let first = engine.process(&captured(NMAP_COMMAND, NMAP_OUTPUT)).unwrap();
    assert_eq!(first.gate, GateDecision::Dispatch);
    let second = engine
        .process(&captured("whatweb http://10.10.10.5", "Apache[2.4.41], Title[Login]"))
        .unwrap();
    assert!(matches!(second.gate, GateDecision::CoolingDown { .. }));

    assert_eq!(advisor.calls(), 1);
    let recs = engine
        .store()
        .list_recommendations(Some(engine.session_id()), 100)
        .unwrap();
    let llm: Vec<_> = recs
        .iter()
        .filter(|r| r.source == RecommendationSource::Llm)
        .collect();
    assert_eq!(llm.len(), 1);
    assert_eq!(llm[0].title, ADVISORY_TITLE);
    assert_eq!(llm[0].body, "Run gobuster against port 80.");
    assert_eq!(llm[0].event_ids, vec![first.event_id]);

    let prompt = advisor.prompts.borrow()[0].clone();
    assert!(prompt.contains(NMAP_COMMAND));
    assert!(prompt.contains("[port_scan]"));
}

#[test]
fn low_novelty_events_skip_the_advisor() {
    let advisor = ScriptedAdvisor::replying("x");
    let mut settings = settings();
    settings.novelty_threshold = 0.95;
    let mut engine = engine_with(Box::new(advisor.clone()), settings);

    let processed = engine.process(&captured("ls", "a b c")).unwrap();
    assert!(matches!(processed.gate, GateDecision::BelowThreshold { .. }));
    assert_eq!(advisor.calls(), 0);
}

#[test]
fn advisory_failure_text_is_stored_as_body() {
    let advisor = flagcaddy_engine::CodexAdvisor::new(&flagcaddy_types::AdvisoryConfig {
        enabled: true,
        binary: "/nonexistent/advisor".into(),
        args: Vec::new(),
        timeout_secs: 5,
    });
    let mut engine = engine_with(Box::new(advisor), settings());
    engine.process(&captured("id", "uid=0(root)")).unwrap();

    let recs = engine
        .store()
        .list_recommendations(Some(engine.session_id()), 10)
        .unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].body, "advisory binary not found: /nonexistent/advisor");
}

#[test]
fn records_persist_across_store_reopen() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = tmp.path().join("flagcaddy.db");
    {
        let mut engine = RecommendationEngine::new(
            Box::new(SqliteStore::open(&db).unwrap()),
            Box::new(RegexFactExtractor::new().unwrap()),
            Box::new(DisabledAdvisor),
            settings(),
            &session(),
        )
        .unwrap();
        engine.process(&captured(NMAP_COMMAND, NMAP_OUTPUT)).unwrap();
    }

    let store = SqliteStore::open(&db).unwrap();
    let sid = store.session_id("lab-box").unwrap().expect("session persisted");
    assert_eq!(store.list_events(sid, 10).unwrap().len(), 1);
    assert_eq!(store.list_recommendations(Some(sid), 10).unwrap().len(), 1);
}
