//! Plain-text summaries of conversion results, shared by the interactive
//! results screen and the non-interactive CLI.

use crate::batch::BatchResult;
use crate::convert::ConversionOutcome;
use crate::error::ErrorRecord;
use std::fmt::Write;

fn error_line(out: &mut String, error: &ErrorRecord) {
    writeln!(out, "Error type: {}", error.kind).ok();
    if let Some(v) = error.details.get("validation_type").and_then(|v| v.as_str()) {
        writeln!(out, "Validation: {}", v).ok();
    }
    if let Some(retries) = error.retries() {
        writeln!(out, "Retries:    {}", retries).ok();
    }
    writeln!(out, "Error:      {}", error.message).ok();
}

/// Summary of a single-item conversion.
pub fn outcome_summary(outcome: &ConversionOutcome) -> String {
    let mut out = String::new();
    writeln!(out, "Input:      {}", outcome.input).ok();
    if let Some(kind) = outcome.kind {
        writeln!(out, "Type:       {}", kind.as_str()).ok();
    }
    if let Some(ref path) = outcome.output_path {
        writeln!(out, "Saved to:   {}", path.display()).ok();
    }
    if let Some(ref md) = outcome.markdown {
        writeln!(out, "Size:       {} lines, {} bytes", md.lines().count(), md.len()).ok();
    }
    if let Some(ref error) = outcome.error {
        error_line(&mut out, error);
    }
    out.trim_end().to_string()
}

/// Totals, success rate, then every success and failure.
pub fn batch_summary(result: &BatchResult) -> String {
    let mut out = String::new();
    if let Some(ref error) = result.error {
        writeln!(out, "Batch could not start.").ok();
        error_line(&mut out, error);
        return out.trim_end().to_string();
    }

    writeln!(out, "Total inputs: {}", result.total).ok();
    writeln!(out, "Successful:   {}", result.successful.len()).ok();
    writeln!(out, "Failed:       {}", result.failed.len()).ok();
    writeln!(out, "Success rate: {:.1}%", result.success_rate()).ok();
    writeln!(out, "Output dir:   {}", result.output_dir.display()).ok();

    if !result.successful.is_empty() {
        writeln!(out, "\nSuccessful conversions:").ok();
        for s in &result.successful {
            let file = s
                .output_path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            writeln!(out, "  ✔ {} ← {} ({})", file, s.original, s.kind.as_str()).ok();
        }
    }

    if !result.failed.is_empty() {
        writeln!(out, "\nFailed conversions:").ok();
        for f in &result.failed {
            let kind = f.kind.map(|k| k.as_str()).unwrap_or("invalid");
            writeln!(out, "  ✘ {} ({}): {}", f.original, kind, f.error.message).ok();
        }
    }
    out.trim_end().to_string()
}
