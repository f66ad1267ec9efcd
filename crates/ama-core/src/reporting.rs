//! Human-readable and machine-readable session reports.

use std::path::{Path, PathBuf};

use ama_state::{validate_user_id, write_atomic};

use crate::domain::{EvaluationRecord, Result};
use crate::orchestrator::SessionResult;

/// Files written by [`write_session_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReportPaths {
    pub result_json: PathBuf,
    pub summary_md: PathBuf,
}

fn push_failures(out: &mut String, title: &str, records: &[EvaluationRecord]) {
    if records.is_empty() {
        return;
    }
    out.push_str(&format!("### {}\n", title));
    for (idx, r) in records.iter().enumerate() {
        out.push_str(&format!(
            "{}. Q: {}\n   - expected: `{}`\n   - got: `{}`\n   - similarity: {:.4}\n",
            idx + 1,
            r.question,
            r.true_answer,
            r.retrieved_answer,
            r.similarity
        ));
    }
    out.push('\n');
}

/// Render markdown summary of a session result.
pub fn render_session_summary_md(result: &SessionResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Session {} ({})\n\n",
        result.session_id, result.user_id
    ));
    out.push_str(&format!(
        "- status: {}\n- states: {}\n",
        if result.success { "success" } else { "failed" },
        result
            .states
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    ));
    if let Some(err) = &result.error {
        out.push_str(&format!("- error: {}\n", err));
    }
    out.push('\n');

    out.push_str("## Initial Evaluation\n");
    if result.no_signal {
        out.push_str("- no probe questions were generated\n\n");
    } else {
        out.push_str(&format!(
            "- questions: {}\n- passed: {}\n- failed: {}\n- pass rate: {:.2}%\n\n",
            result.qa_count, result.passed, result.failed, result.initial_pass_rate
        ));
    }
    push_failures(&mut out, "Failed Questions", &result.failed_probes);

    if let Some(filtered) = result.filtered_lines {
        out.push_str("## Reconstruction\n");
        out.push_str(&format!(
            "- filtered dialogue: {} → {} lines\n- rebuilt: {}\n- corrections added: {}\n",
            result.original_lines, filtered, result.reconstructed, result.corrections_added
        ));
        if let Some(err) = &result.reconstruction_error {
            out.push_str(&format!("- error: {}\n", err));
        }
        out.push('\n');
    }

    if let Some(after) = &result.after_reconstruct {
        out.push_str("## After Reconstruction\n");
        out.push_str(&format!(
            "- questions: {}\n- passed: {}\n- failed: {}\n- pass rate: {:.2}%\n",
            after.qa_count, after.passed, after.failed, after.pass_rate
        ));
        if let Some(delta) = result.improvement {
            out.push_str(&format!("- improvement: {:+.2}%\n", delta));
        }
        out.push('\n');
        push_failures(&mut out, "Remaining Failures", &result.remaining_failures);
    }

    if result.after_no_signal {
        out.push_str("## After Reconstruction\n");
        out.push_str("- no probe questions were generated, nothing to compare\n\n");
    }

    if let Some(path) = &result.memory_file {
        out.push_str("## Artifact\n");
        out.push_str(&format!(
            "- variant: {}\n- file: `{}`\n",
            result.artifact_variant.map(|v| v.as_str()).unwrap_or("unknown"),
            path.display()
        ));
        if let Some(digest) = &result.artifact_digest {
            out.push_str(&format!("- sha256: `{}`\n", digest));
        }
    }
    out
}

/// Write `<user>_<session>_result.json` and `<user>_<session>_summary.md`
/// into `dir`. Ids that could name a path outside `dir` are rejected.
pub async fn write_session_report(dir: &Path, result: &SessionResult) -> Result<SessionReportPaths> {
    validate_user_id(&result.user_id)?;
    validate_user_id(&result.session_id)?;
    let stem = format!("{}_{}", result.user_id, result.session_id);
    let result_json = dir.join(format!("{stem}_result.json"));
    let summary_md = dir.join(format!("{stem}_summary.md"));

    write_atomic(&result_json, &serde_json::to_vec_pretty(result)?).await?;
    write_atomic(&summary_md, render_session_summary_md(result).as_bytes()).await?;

    Ok(SessionReportPaths {
        result_json,
        summary_md,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QaPair;
    use crate::orchestrator::{ArtifactVariant, PassSummary, SessionState};

    fn reconstructed_result() -> SessionResult {
        let mut r = SessionResult::new("user_001", "s1");
        r.success = true;
        r.qa_count = 10;
        r.passed = 5;
        r.failed = 5;
        r.pass_rate = 50.0;
        r.initial_pass_rate = 50.0;
        r.original_lines = 40;
        r.filtered_lines = Some(12);
        r.reconstructed = true;
        r.corrections_added = 5;
        r.after_reconstruct = Some(PassSummary {
            pass_rate: 90.0,
            qa_count: 10,
            passed: 9,
            failed: 1,
        });
        r.improvement = Some(40.0);
        r.failed_probes = vec![EvaluationRecord::scored(
            &QaPair::new("Which hotel?", "Park Hyatt"),
            "Unanswerable".to_string(),
            0.1,
            0.8,
        )];
        r.artifact_variant = Some(ArtifactVariant::Reconstructed);
        r.memory_file = Some(PathBuf::from("output/user_001_s1_reconstructed_memory.json"));
        r.states = vec![
            SessionState::Started,
            SessionState::Built,
            SessionState::Evaluated,
            SessionState::Reconstructing,
            SessionState::ReEvaluated,
            SessionState::Saved,
            SessionState::Done,
        ];
        r
    }

    #[test]
    fn summary_md_has_all_sections() {
        let md = render_session_summary_md(&reconstructed_result());
        assert!(md.starts_with("# Session s1 (user_001)"));
        assert!(md.contains("- pass rate: 50.00%"));
        assert!(md.contains("40 → 12 lines"));
        assert!(md.contains("- improvement: +40.00%"));
        assert!(md.contains("Q: Which hotel?"));
        assert!(md.contains("- variant: reconstructed"));
    }

    #[test]
    fn summary_md_for_failed_session() {
        let md = render_session_summary_md(&SessionResult::failed("u", "s", "disk full"));
        assert!(md.contains("- status: failed"));
        assert!(md.contains("- error: disk full"));
        assert!(!md.contains("## After Reconstruction"));
    }

    #[tokio::test]
    async fn report_refuses_ids_that_escape_dir() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("a").join("out");

        for (user, session) in [("../../escaped", "s"), ("u", "../s"), ("u", "x/y")] {
            let result = SessionResult::failed(user, session, "bad id");
            assert!(write_session_report(&out, &result).await.is_err());
        }
        assert!(!root.path().join("escaped_s_result.json").exists());
        assert!(!out.exists());
    }

    #[test]
    fn summary_md_marks_empty_reevaluation() {
        let mut r = reconstructed_result();
        r.after_reconstruct = None;
        r.improvement = None;
        r.after_no_signal = true;
        let md = render_session_summary_md(&r);
        assert!(md.contains("nothing to compare"));
        assert!(!md.contains("improvement"));
    }

    #[tokio::test]
    async fn report_files_written() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_session_report(dir.path(), &reconstructed_result())
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.result_json).unwrap()).unwrap();
        assert_eq!(json["after_reconstruct"]["pass_rate"], 90.0);
        assert!(std::fs::read_to_string(&paths.summary_md)
            .unwrap()
            .contains("After Reconstruction"));
    }
}
