use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use ama_core::{
    filter_dialogue, write_session_report, ArtifactVariant, DialogueSession, Evaluator,
    KeywordAdapter, PipelineConfig, QaPolicy, SessionOrchestrator, SessionState,
};
use ama_oracle::fakes::{
    ContextAnswerOracle, ExactMatchScorer, ScriptedQuestionOracle, StaticSummarizer,
};
use ama_oracle::GeneratedQa;
use ama_state::{
    read_artifact, ArtifactRef, BuildReport, Correction, JsonFileStore, MemoryEntry, MemorySource,
    MemoryStore, SearchMethod, StorageError, StorageResult,
};
use tempfile::tempdir;

const DIALOGUE: &str = "user: We fly JAL Flight 004 from New York on March 15\n\
assistant: Great, and where are you staying?\n\
user: The Park Hyatt in Shinjuku, Tokyo is our first city\n\
assistant: Any dietary needs?\n\
user: Sarah has a shellfish allergy, we booked Sukiyabashi Jiro anyway\n\
assistant: Then on to Kyoto?\n\
user: Shinkansen to Kyoto to visit Kinkaku-ji\n\
user: Mike flies Korean Air separately";

/// (question, answer, memory holding the answer)
const FACTS: [(&str, &str, &str); 10] = [
    ("What airline?", "JAL", "airline JAL"),
    ("Which hotel?", "Park Hyatt", "hotel Park Hyatt"),
    ("Which flight number?", "Flight 004", "flight number Flight 004"),
    ("Who has the shellfish allergy?", "Sarah", "shellfish allergy: Sarah"),
    ("Which sushi restaurant?", "Sukiyabashi Jiro", "sushi restaurant Sukiyabashi Jiro"),
    ("Which city comes first?", "Tokyo", "first city Tokyo"),
    ("Which train goes to Kyoto?", "Shinkansen", "train to Kyoto Shinkansen"),
    ("Which temple to visit?", "Kinkaku-ji", "temple visit Kinkaku-ji"),
    ("What departure date?", "March 15", "departure date March 15"),
    ("Who flies Korean Air?", "Mike", "Korean Air passenger Mike"),
];

fn qa_pairs() -> Vec<GeneratedQa> {
    FACTS.iter().map(|(q, a, _)| GeneratedQa::new(*q, *a)).collect()
}

/// Summarizer remembering only the first `known` facts.
fn summarizer(known: usize) -> StaticSummarizer {
    StaticSummarizer::new(
        "Trip to Japan",
        FACTS.iter().take(known).map(|(_, _, m)| *m).collect(),
    )
}

struct Harness {
    orchestrator: SessionOrchestrator,
    store: Arc<JsonFileStore>,
    questions: Arc<ScriptedQuestionOracle>,
    _dir: tempfile::TempDir,
}

fn harness(summarizer: StaticSummarizer, questions: ScriptedQuestionOracle, policy: QaPolicy) -> Harness {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(
        dir.path().join("memory_storage"),
        Arc::new(summarizer),
    ));
    let questions = Arc::new(questions);
    let config = PipelineConfig::default()
        .with_search_method(SearchMethod::Keyword)
        .with_qa_policy(policy);
    let evaluator = Evaluator::new(
        questions.clone(),
        Arc::new(ContextAnswerOracle::from_pairs(&qa_pairs())),
        Arc::new(ExactMatchScorer),
        config,
    );
    let orchestrator = SessionOrchestrator::new(
        store.clone(),
        evaluator,
        Arc::new(KeywordAdapter::new()),
        dir.path().join("output"),
    );
    Harness {
        orchestrator,
        store,
        questions,
        _dir: dir,
    }
}

fn session(user: &str, id: &str) -> DialogueSession {
    DialogueSession::from_text(user, id, DIALOGUE).unwrap()
}

#[tokio::test]
async fn passing_memory_is_saved_as_original() {
    let h = harness(summarizer(8), ScriptedQuestionOracle::new(qa_pairs()), QaPolicy::Reuse);
    let result = h.orchestrator.run(&session("user_001", "s1")).await;

    assert!(result.success);
    assert_eq!(result.qa_count, 10);
    assert_eq!(result.passed, 8);
    assert_eq!(result.pass_rate, 80.0);
    assert!(!result.reconstructed);
    assert!(result.after_reconstruct.is_none());
    assert_eq!(result.artifact_variant, Some(ArtifactVariant::Original));
    assert_eq!(
        result.states,
        vec![
            SessionState::Started,
            SessionState::Built,
            SessionState::Evaluated,
            SessionState::Saved,
            SessionState::Done,
        ]
    );

    let path = result.memory_file.unwrap();
    assert!(path.ends_with("user_001_s1_original_memory.json"));
    assert_eq!(read_artifact(&path).await.unwrap().len(), 8);
}

#[tokio::test]
async fn failing_memory_is_reconstructed_and_reevaluated() {
    let h = harness(summarizer(5), ScriptedQuestionOracle::new(qa_pairs()), QaPolicy::Reuse);
    let result = h.orchestrator.run(&session("user_001", "s1")).await;

    assert!(result.success);
    assert_eq!(result.pass_rate, 50.0);
    assert_eq!(result.failed_probes.len(), 5);
    assert!(result.reconstructed);
    assert_eq!(result.corrections_added, 5);
    assert!(result.filtered_lines.unwrap() <= result.original_lines);

    let after = result.after_reconstruct.clone().unwrap();
    assert_eq!(after.qa_count, 10);
    assert_eq!(after.pass_rate, 100.0);
    assert_eq!(result.improvement, Some(50.0));
    assert!(result.remaining_failures.is_empty());
    // Reuse policy: the same probes are asked again.
    assert_eq!(h.questions.calls(), 1);

    assert_eq!(result.artifact_variant, Some(ArtifactVariant::Reconstructed));
    let entries = read_artifact(result.memory_file.as_ref().unwrap()).await.unwrap();
    assert_eq!(entries.len(), 15);
    let corrections = entries
        .iter()
        .filter(|e| e.source() == MemorySource::Correction)
        .count();
    assert_eq!(corrections, 5);
    assert!(result.states.contains(&SessionState::ReEvaluated));
}

#[tokio::test]
async fn empty_probe_set_is_no_signal() {
    let h = harness(summarizer(5), ScriptedQuestionOracle::failing(), QaPolicy::Reuse);
    let result = h.orchestrator.run(&session("user_001", "s1")).await;

    assert!(result.success);
    assert!(result.no_signal);
    assert_eq!(result.qa_count, 0);
    assert_eq!(result.pass_rate, 0.0);
    assert!(!result.reconstructed);
    assert_eq!(result.artifact_variant, Some(ArtifactVariant::Original));
}

#[tokio::test]
async fn failed_reconstruction_keeps_existing_memory() {
    let h = harness(
        summarizer(5).fail_after(1),
        ScriptedQuestionOracle::new(qa_pairs()),
        QaPolicy::Reuse,
    );
    let result = h.orchestrator.run(&session("user_001", "s1")).await;

    assert!(result.success);
    assert_eq!(result.pass_rate, 50.0);
    assert!(!result.reconstructed);
    assert_eq!(result.corrections_added, 0);
    assert!(result.reconstruction_error.is_some());
    assert!(result.after_reconstruct.is_none());
    assert!(!result.states.contains(&SessionState::ReEvaluated));
    assert_eq!(result.artifact_variant, Some(ArtifactVariant::Original));

    assert_eq!(h.store.count("user_001").await.unwrap(), 5);
    let entries = read_artifact(result.memory_file.as_ref().unwrap()).await.unwrap();
    assert_eq!(entries.len(), 5);
}

#[tokio::test]
async fn regenerate_policy_asks_fresh_questions() {
    let fresh = vec![GeneratedQa::new("Which hotel?", "Park Hyatt")];
    let h = harness(
        summarizer(5),
        ScriptedQuestionOracle::with_script(vec![Some(qa_pairs()), Some(fresh)]),
        QaPolicy::Regenerate,
    );
    let result = h.orchestrator.run(&session("user_001", "s1")).await;

    assert!(result.reconstructed);
    assert_eq!(h.questions.calls(), 2);
    let after = result.after_reconstruct.unwrap();
    assert_eq!(after.qa_count, 1);
    assert_eq!(after.pass_rate, 100.0);
}

#[tokio::test]
async fn empty_reevaluation_is_reported_without_comparison() {
    let h = harness(
        summarizer(5),
        ScriptedQuestionOracle::with_script(vec![Some(qa_pairs()), None]),
        QaPolicy::Regenerate,
    );
    let result = h.orchestrator.run(&session("user_001", "s1")).await;

    assert!(result.success);
    assert_eq!(result.pass_rate, 50.0);
    assert!(result.reconstructed);
    assert_eq!(h.questions.calls(), 2);
    assert!(result.after_no_signal);
    assert!(result.after_reconstruct.is_none());
    assert!(result.improvement.is_none());
    assert!(result.remaining_failures.is_empty());
    assert!(result.states.contains(&SessionState::ReEvaluated));
    assert_eq!(result.artifact_variant, Some(ArtifactVariant::Reconstructed));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["after_no_signal"], true);
    assert!(json["after_reconstruct"].is_null());
}

const EXISTING_MEMORIES: &str = r#"[
  {
    "memory_id": "0d6f1c9e-8a47-4b1e-9d2a-5c3e7f1b2a40",
    "user_id": "user_001",
    "content": "Sarah is allergic to shellfish",
    "timestamp": "2024-01-10T09:12:00",
    "created_at": "2024-01-10T09:12:44.118203",
    "metadata": {"source": "dialogue_summarization", "summary": "Earlier planning call"}
  }
]"#;

#[tokio::test]
async fn memory_file_from_earlier_runs_is_kept() {
    let h = harness(summarizer(8), ScriptedQuestionOracle::new(qa_pairs()), QaPolicy::Reuse);
    let storage = h.store.storage_dir().unwrap().to_path_buf();
    std::fs::create_dir_all(&storage).unwrap();
    std::fs::write(storage.join("user_001_memories.json"), EXISTING_MEMORIES).unwrap();

    let result = h.orchestrator.run(&session("user_001", "s1")).await;
    assert!(result.success);
    assert!(!result.reconstructed);
    assert_eq!(h.store.count("user_001").await.unwrap(), 9);

    let entries = read_artifact(result.memory_file.as_ref().unwrap()).await.unwrap();
    assert_eq!(entries.len(), 9);
    assert_eq!(entries[0].content, "Sarah is allergic to shellfish");
    assert_eq!(entries[0].created_at, "2024-01-10T09:12:44.118203");

    let on_disk: Vec<MemoryEntry> =
        serde_json::from_slice(&std::fs::read(storage.join("user_001_memories.json")).unwrap())
            .unwrap();
    assert_eq!(on_disk.len(), 9);
    assert_eq!(on_disk[0].memory_id, "0d6f1c9e-8a47-4b1e-9d2a-5c3e7f1b2a40");
}

/// JSON store whose rebuilds fail with a storage error after the first one.
struct RebuildFailsAfterFirst {
    inner: JsonFileStore,
    rebuilds: AtomicUsize,
}

#[async_trait]
impl MemoryStore for RebuildFailsAfterFirst {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
        method: SearchMethod,
    ) -> StorageResult<Vec<MemoryEntry>> {
        self.inner.search(user_id, query, top_k, method).await
    }

    async fn rebuild_from_dialogue(&self, user_id: &str, dialogue: &str) -> StorageResult<BuildReport> {
        if self.rebuilds.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(StorageError::Io(std::io::Error::other("disk unplugged")));
        }
        self.inner.rebuild_from_dialogue(user_id, dialogue).await
    }

    async fn append_corrections(
        &self,
        user_id: &str,
        corrections: &[Correction],
    ) -> StorageResult<usize> {
        self.inner.append_corrections(user_id, corrections).await
    }

    async fn persist(&self, user_id: &str, destination: &Path) -> StorageResult<ArtifactRef> {
        self.inner.persist(user_id, destination).await
    }

    async fn entries(&self, user_id: &str) -> StorageResult<Vec<MemoryEntry>> {
        self.inner.entries(user_id).await
    }
}

#[tokio::test]
async fn store_error_during_rebuild_keeps_existing_memory() {
    let dir = tempdir().unwrap();
    let store = Arc::new(RebuildFailsAfterFirst {
        inner: JsonFileStore::new(dir.path().join("memory_storage"), Arc::new(summarizer(5))),
        rebuilds: AtomicUsize::new(0),
    });
    let evaluator = Evaluator::new(
        Arc::new(ScriptedQuestionOracle::new(qa_pairs())),
        Arc::new(ContextAnswerOracle::from_pairs(&qa_pairs())),
        Arc::new(ExactMatchScorer),
        PipelineConfig::default().with_search_method(SearchMethod::Keyword),
    );
    let orchestrator = SessionOrchestrator::new(
        store.clone(),
        evaluator,
        Arc::new(KeywordAdapter::new()),
        dir.path().join("output"),
    );

    let result = orchestrator.run(&session("user_001", "s1")).await;

    assert!(result.success);
    assert_eq!(store.rebuilds.load(Ordering::SeqCst), 2);
    assert_eq!(result.pass_rate, 50.0);
    assert!(!result.reconstructed);
    assert_eq!(result.corrections_added, 0);
    assert!(result
        .reconstruction_error
        .as_deref()
        .unwrap()
        .contains("disk unplugged"));
    assert!(result.after_reconstruct.is_none());
    assert!(!result.states.contains(&SessionState::ReEvaluated));
    assert_eq!(result.state(), SessionState::Done);
    assert_eq!(result.artifact_variant, Some(ArtifactVariant::Original));

    assert_eq!(store.count("user_001").await.unwrap(), 5);
    let entries = read_artifact(result.memory_file.as_ref().unwrap()).await.unwrap();
    assert_eq!(entries.len(), 5);
}

#[tokio::test]
async fn batch_continues_past_a_failed_session() {
    let h = harness(summarizer(8), ScriptedQuestionOracle::new(qa_pairs()), QaPolicy::Reuse);
    let sessions = vec![
        session("user_001", "../escape"),
        session("user_002", "s2"),
        session("../outside", "s3"),
    ];
    let results = h.orchestrator.run_batch(&sessions).await;

    assert_eq!(results.len(), 3);
    assert!(!results[0].success);
    assert_eq!(results[0].state(), SessionState::Failed);
    assert!(results[0].error.is_some());

    assert!(results[1].success);
    assert_eq!(results[1].state(), SessionState::Done);

    assert!(!results[2].success);
    assert!(results.iter().all(|r| r.state().is_terminal()));

    // Users never see each other's memory.
    assert_eq!(h.store.count("user_002").await.unwrap(), 8);
    assert_eq!(h.store.count("user_001").await.unwrap(), 0);
}

#[tokio::test]
async fn memory_only_grows_across_sessions() {
    let h = harness(summarizer(5), ScriptedQuestionOracle::new(qa_pairs()), QaPolicy::Reuse);
    let mut last = 0;
    for id in ["s1", "s2", "s3"] {
        let result = h.orchestrator.run(&session("user_001", id)).await;
        assert!(result.success);
        let count = h.store.count("user_001").await.unwrap();
        assert!(count > last);
        last = count;
    }
}

#[tokio::test]
async fn session_report_is_written_next_to_artifact() {
    let h = harness(summarizer(5), ScriptedQuestionOracle::new(qa_pairs()), QaPolicy::Reuse);
    let result = h.orchestrator.run(&session("user_001", "s1")).await;
    let paths = write_session_report(h.orchestrator.output_dir(), &result)
        .await
        .unwrap();

    assert!(paths.result_json.ends_with("user_001_s1_result.json"));
    let md = std::fs::read_to_string(&paths.summary_md).unwrap();
    assert!(md.contains("## After Reconstruction"));
    assert!(md.contains("- improvement: +50.00%"));
}

#[test]
fn filtered_dialogue_is_a_subsequence_of_the_original() {
    let failed = vec![
        Correction::new("Which temple to visit?", "Kinkaku-ji"),
        Correction::new("Who flies Korean Air?", "Mike"),
    ];
    let filtered = filter_dialogue(DIALOGUE, &failed);
    let original: Vec<&str> = DIALOGUE.lines().collect();

    let mut cursor = 0;
    for line in filtered.lines() {
        let pos = original[cursor..]
            .iter()
            .position(|l| *l == line)
            .expect("filtered line comes from the dialogue, in order");
        cursor += pos + 1;
    }
    assert_eq!(filtered.lines().count(), 2);
}
