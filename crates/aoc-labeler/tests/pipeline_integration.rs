use aoc_label_core::{
    CandidateError, CandidateFailureKind, CandidateSource, LabelConfig, LabelOrigin, LabelPrompt,
    LabelRecord, LabelSource, PersistenceMode,
};
use aoc_label_store::{LabelSink, LabelsFileStore, PersistentLabelStore, StoreError};
use aoc_labeler::{
    InMemoryTurns, JsonlTranscript, LabelOutcome, LabelPipeline, LabelRequest, PipelineError,
    SkipReason, UnavailableCandidateSource,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::path::Path;

struct FixedSource(&'static str);

impl CandidateSource for FixedSource {
    async fn complete(&self, _prompt: &LabelPrompt) -> Result<String, CandidateError> {
        Ok(self.0.to_string())
    }
}

struct RejectingSource;

impl CandidateSource for RejectingSource {
    async fn complete(&self, _prompt: &LabelPrompt) -> Result<String, CandidateError> {
        Err(CandidateError::new(
            CandidateFailureKind::ProviderError,
            "401 unauthorized",
        ))
    }
}

fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 6, 9, 0, 0)
        .single()
        .expect("valid timestamp")
        + Duration::seconds(offset_secs)
}

fn shop_turns() -> InMemoryTurns {
    InMemoryTurns::new([
        "Help me fix checkout taxes",
        "Need WooCommerce shipping setup",
        "Add payment gateway notes",
    ])
}

fn labels_store(dir: &Path) -> PersistentLabelStore {
    PersistentLabelStore::open(PersistenceMode::LabelsFile, dir.join("labels.json"))
}

fn relabel_config() -> LabelConfig {
    LabelConfig {
        relabel: true,
        ..LabelConfig::default()
    }
}

#[tokio::test]
async fn failing_generator_falls_back_to_frequent_terms() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = LabelPipeline::new(
        LabelConfig::default(),
        RejectingSource,
        labels_store(dir.path()),
    )
    .expect("pipeline");

    let outcome = pipeline
        .run(&LabelRequest::new("shop-1"), &shop_turns(), ts(0))
        .await
        .expect("run");

    let LabelOutcome::Labeled {
        label,
        origin,
        candidate_failure,
        ..
    } = outcome
    else {
        panic!("expected a fallback label");
    };
    assert_eq!(origin, LabelOrigin::Fallback);
    assert_eq!(candidate_failure, Some(CandidateFailureKind::ProviderError));
    assert!(!label.text.is_empty());
    assert!(label.text.chars().count() <= 28);
    assert!(label.text.contains("Woo"));
    assert!(!label.text.to_lowercase().contains("help"));
}

#[tokio::test]
async fn second_run_keeps_first_label() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = FixedSource("Checkout Tax Fixes");
    let pipeline =
        LabelPipeline::new(LabelConfig::default(), source, labels_store(dir.path()))
            .expect("pipeline");
    let request = LabelRequest::new("shop-1").with_context_name("shop");

    let first = pipeline
        .run(&request, &shop_turns(), ts(0))
        .await
        .expect("first");
    let second = pipeline
        .run(&request, &shop_turns(), ts(60))
        .await
        .expect("second");

    assert!(first.is_labeled());
    assert_eq!(first.label_text(), Some("Checkout Tax Fixes"));
    assert_eq!(second.label_text(), first.label_text());
    assert!(matches!(
        second,
        LabelOutcome::Skipped {
            reason: SkipReason::AlreadyLabeled { .. },
            ..
        }
    ));

    let stored = pipeline.sink().get_label("shop-1").await.expect("stored");
    assert_eq!(stored.updated_at, ts(0));
}

#[tokio::test]
async fn manual_label_survives_without_relabel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = labels_store(dir.path());
    store
        .set_label("shop-1", LabelRecord::manual("My Shop Work", ts(-30)))
        .await
        .expect("seed");

    let source = FixedSource("Something Else");
    let pipeline =
        LabelPipeline::new(LabelConfig::default(), source, store).expect("pipeline");
    let outcome = pipeline
        .run(&LabelRequest::new("shop-1"), &shop_turns(), ts(0))
        .await
        .expect("run");

    assert_eq!(outcome.label_text(), Some("My Shop Work"));
    let stored = pipeline.sink().get_label("shop-1").await.expect("stored");
    assert_eq!(stored.text, "My Shop Work");
    assert_eq!(stored.source, LabelSource::Manual);
}

#[tokio::test]
async fn relabel_replaces_manual_label() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = labels_store(dir.path());
    store
        .set_label("shop-1", LabelRecord::manual("My Shop Work", ts(-30)))
        .await
        .expect("seed");

    let pipeline = LabelPipeline::new(
        relabel_config(),
        FixedSource("Shipping Setup"),
        store,
    )
    .expect("pipeline");
    let outcome = pipeline
        .run(&LabelRequest::new("shop-1"), &shop_turns(), ts(0))
        .await
        .expect("run");

    assert!(outcome.is_labeled());
    let stored = pipeline.sink().get_label("shop-1").await.expect("stored");
    assert_eq!(stored.text, "Shipping Setup");
    assert_eq!(stored.source, LabelSource::Generated);
}

#[tokio::test]
async fn short_session_is_not_labeled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = LabelPipeline::new(
        LabelConfig::default(),
        FixedSource("Never Used"),
        labels_store(dir.path()),
    )
    .expect("pipeline");

    let outcome = pipeline
        .run(
            &LabelRequest::new("s1"),
            &InMemoryTurns::new(["just one question", "and another"]),
            ts(0),
        )
        .await
        .expect("run");

    assert!(matches!(
        outcome,
        LabelOutcome::Skipped {
            reason: SkipReason::BelowThreshold {
                user_turns: 2,
                required: 3
            },
            ..
        }
    ));
    assert!(pipeline.sink().read().await.is_empty());
    assert!(!dir.path().join("labels.json").exists());
}

#[tokio::test]
async fn missing_transcript_is_a_quiet_skip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = LabelPipeline::new(
        LabelConfig::default(),
        UnavailableCandidateSource,
        labels_store(dir.path()),
    )
    .expect("pipeline");

    let transcript = JsonlTranscript::new(dir.path().join("missing.jsonl"));
    let outcome = pipeline
        .run(&LabelRequest::new("s1"), &transcript, ts(0))
        .await
        .expect("run");

    assert!(matches!(
        outcome,
        LabelOutcome::Skipped {
            reason: SkipReason::NoTranscript { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn jsonl_transcript_feeds_first_user_turns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transcript_path = dir.path().join("session.jsonl");
    let lines = [
        r#"{"type":"user","message":{"role":"user","content":"Deploy the staging cluster"}}"#,
        r#"{"type":"assistant","message":{"role":"assistant","content":"ok"}}"#,
        r#"{"type":"user","message":{"role":"user","content":"Staging deploy keeps failing"}}"#,
        "{broken",
        r#"{"type":"user","message":{"role":"user","content":[{"type":"text","text":"Check staging logs"}]}}"#,
        r#"{"type":"user","message":{"role":"user","content":"Kubernetes secrets rotation"}}"#,
    ];
    std::fs::write(&transcript_path, lines.join("\n")).expect("transcript");

    let config = LabelConfig {
        max_messages_for_label: 3,
        ..LabelConfig::default()
    };
    let pipeline = LabelPipeline::new(config, UnavailableCandidateSource, labels_store(dir.path()))
        .expect("pipeline");
    let outcome = pipeline
        .run(
            &LabelRequest::new("ops-7"),
            &JsonlTranscript::new(&transcript_path),
            ts(0),
        )
        .await
        .expect("run");

    let text = outcome.label_text().expect("labeled").to_string();
    assert!(text.starts_with("Staging"), "{text}");
    assert!(!text.contains("K8s"), "{text}");
    assert!(text.chars().count() <= 28);
}

#[tokio::test]
async fn session_meta_mode_writes_into_host_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let meta_path = dir.path().join("sessions.json");
    std::fs::write(&meta_path, r#"{"shop-1":{"cwd":"/work/shop"}}"#).expect("seed");

    let pipeline = LabelPipeline::new(
        LabelConfig::default(),
        FixedSource("Shop Taxes"),
        PersistentLabelStore::open(PersistenceMode::SessionMeta, &meta_path),
    )
    .expect("pipeline");
    pipeline
        .run(&LabelRequest::new("shop-1"), &shop_turns(), ts(0))
        .await
        .expect("run");

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&meta_path).expect("read")).expect("json");
    assert_eq!(value["shop-1"]["cwd"], "/work/shop");
    assert_eq!(value["shop-1"]["label"]["text"], "Shop Taxes");
    assert_eq!(value["shop-1"]["label"]["source"], "generated");
    assert_eq!(value["shop-1"]["label"]["schemaVersion"], "label.v1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_runs_on_one_store_keep_every_label() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = LabelPipeline::new(
        LabelConfig::default(),
        UnavailableCandidateSource,
        labels_store(dir.path()),
    )
    .expect("pipeline");

    let shop = shop_turns();
    let first = LabelRequest::new("a");
    let second = LabelRequest::new("b");
    let other_turns = InMemoryTurns::new([
        "Rotate database credentials",
        "Database failover drill",
        "Document database backups",
    ]);
    let (left, right) = tokio::join!(
        pipeline.run(&first, &shop, ts(0)),
        pipeline.run(&second, &other_turns, ts(0)),
    );
    left.expect("a");
    right.expect("b");

    let labels = LabelsFileStore::new(dir.path().join("labels.json")).read().await;
    assert_eq!(labels.len(), 2);
    assert!(labels["a"].text.contains("Woo"));
    assert_eq!(labels["b"].text, "DB Credentials Failover");
}

#[tokio::test]
async fn unwritable_store_is_reported_to_caller() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").expect("blocker");

    let pipeline = LabelPipeline::new(
        LabelConfig::default(),
        UnavailableCandidateSource,
        LabelsFileStore::new(blocker.join("labels.json")),
    )
    .expect("pipeline");
    let err = pipeline
        .run(&LabelRequest::new("s1"), &shop_turns(), ts(0))
        .await
        .expect_err("write must fail");

    assert!(matches!(err, PipelineError::Store(StoreError::Io { .. })));
}
