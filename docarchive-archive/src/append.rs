use crate::report::{AppendOutcome, AppendReport, SkipReason};
use crate::store::{AppendResult, ArchiveStore};
use docarchive_config::TranslationSpec;

/// Append each translation line to its file, in order. Files that do not
/// exist are skipped rather than created.
pub async fn append_translations(store: &ArchiveStore, entries: &[TranslationSpec]) -> AppendReport {
    let mut report = AppendReport::begin();
    tracing::info!(run_id = %report.run_id, entries = entries.len(), "append.start");

    for entry in entries {
        let outcome = match store.append_line(&entry.path, &entry.line).await {
            Ok(AppendResult::Appended(_)) => AppendOutcome::Appended,
            Ok(AppendResult::Missing(path)) => {
                tracing::warn!(path = %path.display(), "append.missing");
                AppendOutcome::Skipped {
                    reason: SkipReason::MissingFile,
                }
            }
            Err(e) => AppendOutcome::Failed {
                reason: e.to_string(),
            },
        };
        tracing::info!(path = %entry.path, outcome = %outcome, "append.item");
        report.push(&entry.path, outcome);
    }

    let report = report.finish();
    tracing::info!(run_id = %report.run_id, summary = %report.summary(), "append.done");
    report
}
