use std::io::{self, Write};

use anyhow::Result;
use serde_json::{json, Value};

use crate::cli::OutputMode;
use crate::commands::Report;

pub fn render(report: &Report, mode: OutputMode) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match mode {
        OutputMode::Human => {
            for line in human_lines(report) {
                writeln!(handle, "{line}")?;
            }
        }
        OutputMode::Json => {
            serde_json::to_writer(&mut handle, &json_payload(report))?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// JSON body for a report. An infinite distance (nothing compared) is
/// emitted as `null`.
pub fn json_payload(report: &Report) -> Value {
    match report {
        Report::Enrolled { identity, summary } => json!({
            "identity": identity,
            "hasFaceRecognition": summary.has_face_recognition,
            "descriptorCount": summary.descriptor_count,
            "wasUpdate": summary.was_update,
        }),
        Report::Verified { identity, result } => json!({
            "identity": identity,
            "distance": finite_or_null(result.verdict.distance),
            "isMatch": result.verdict.is_match,
            "compared": result.compared,
            "skipped": result.skipped,
            "stoppedEarly": result.stopped_early,
        }),
        Report::Identified(found) => match found {
            Some(found) => json!({
                "identity": found.identity,
                "distance": finite_or_null(found.verdict.distance),
                "isMatch": found.verdict.is_match,
            }),
            None => json!({ "identity": null, "isMatch": false }),
        },
        Report::Revoked { identity } => json!({
            "identity": identity,
            "hasFaceRecognition": false,
        }),
        Report::Status(status) => json!(status),
        Report::Averaged(descriptor) => json!(descriptor),
    }
}

fn finite_or_null(distance: f64) -> Value {
    if distance.is_finite() {
        json!(distance)
    } else {
        Value::Null
    }
}

pub fn human_lines(report: &Report) -> Vec<String> {
    match report {
        Report::Enrolled { identity, summary } => {
            let action = if summary.was_update {
                "Re-enrolled"
            } else {
                "Enrolled"
            };
            vec![format!(
                "{action} {identity} with {} descriptor(s)",
                summary.descriptor_count
            )]
        }
        Report::Verified { identity, result } => {
            let mut lines = vec![format!(
                "{identity}: {} (distance {:.4})",
                if result.verdict.is_match {
                    "match"
                } else {
                    "no match"
                },
                result.verdict.distance
            )];
            if result.skipped > 0 {
                lines.push(format!(
                    "Skipped {} malformed gallery descriptor(s)",
                    result.skipped
                ));
            }
            lines
        }
        Report::Identified(Some(found)) => vec![format!(
            "Identified {} (distance {:.4})",
            found.identity, found.verdict.distance
        )],
        Report::Identified(None) => vec!["No enrolled identity matched".to_string()],
        Report::Revoked { identity } => vec![format!("Revoked face recognition for {identity}")],
        Report::Status(status) => vec![format!(
            "{}: face recognition {} ({} descriptor(s))",
            status.identity,
            if status.has_face_recognition {
                "enabled"
            } else {
                "disabled"
            },
            status.descriptor_count
        )],
        Report::Averaged(descriptor) => vec![descriptor
            .values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")],
    }
}
