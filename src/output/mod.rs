use anyhow::{Context, Result};
use std::path::Path;

use crate::chunking::{ChunkStats, Segment};
use crate::cli::OutputFormat;
use crate::pipeline::{FinalArtifact, PipelineOutput, StageFailure, ValidationVerdict};

const REVIEW_MARKER: &str = "\n\n---\n\n> **Review:**";

/// Render a run in the requested format
pub fn render(output: &PipelineOutput, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(format_as_markdown(output)),
        OutputFormat::Json => format_as_json(output),
    }
}

/// Notes followed by a short review footer
pub fn format_as_markdown(output: &PipelineOutput) -> String {
    let mut content = output.artifact.as_str().trim_end().to_string();
    content.push_str(REVIEW_MARKER);
    content.push(' ');
    content.push_str(&verdict_line(&output.verdict));

    if !output.failures.is_empty() {
        content.push_str(&format!(
            "\n>\n> {} item(s) fell back to unprocessed text: {}",
            output.failures.len(),
            describe_failures(&output.failures)
        ));
    }
    content.push('\n');
    content
}

pub fn format_as_json(output: &PipelineOutput) -> Result<String> {
    serde_json::to_string_pretty(output).context("Failed to serialize pipeline output")
}

fn verdict_line(verdict: &ValidationVerdict) -> String {
    match verdict {
        ValidationVerdict::Approved => "approved".to_string(),
        ValidationVerdict::Suggestions(text) => {
            let quoted = text.lines().collect::<Vec<_>>().join("\n> ");
            format!("suggestions\n>\n> {}", quoted)
        }
        ValidationVerdict::Unavailable(reason) => format!("unavailable ({})", reason),
        ValidationVerdict::Skipped => "skipped".to_string(),
    }
}

/// `summarizing#1, cleaning#3`
pub fn describe_failures(failures: &[StageFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}#{}", f.stage, f.index))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Save a run to file
pub async fn save_to_file(output: &PipelineOutput, path: &Path, format: OutputFormat) -> Result<()> {
    let content = render(output, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a run to console
pub fn print_to_console(output: &PipelineOutput, format: OutputFormat) -> Result<()> {
    let content = render(output, format)?;
    println!("{}", content);
    Ok(())
}

/// Read notes written by `save_to_file`, in either format
pub fn load_notes(path: &Path) -> Result<FinalArtifact> {
    let content = fs_err::read_to_string(path).context("Failed to read notes file")?;

    let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
    if is_json {
        let output: PipelineOutput = serde_json::from_str(&content).context("Failed to parse notes JSON")?;
        return Ok(output.artifact);
    }

    let notes = match content.rfind(REVIEW_MARKER) {
        Some(pos) => &content[..pos],
        None => content.as_str(),
    };
    Ok(FinalArtifact::new(notes.trim()))
}

/// Human-readable summary of how a transcript splits
pub fn format_chunk_report(stats: &ChunkStats, segments: &[Segment], show_segments: bool) -> String {
    let mut report = format!(
        "Characters: {}\nSegments:   {} (shortest {}, longest {})\nBatches:    {}\n",
        stats.total_chars, stats.segments, stats.shortest_segment, stats.longest_segment, stats.batches
    );

    if show_segments {
        for (index, segment) in segments.iter().enumerate() {
            report.push_str(&format!("\n[{}] {} chars\n{}\n", index, segment.char_len(), segment));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RunStats, Stage};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample(verdict: ValidationVerdict, failures: Vec<StageFailure>) -> PipelineOutput {
        PipelineOutput {
            run_id: Uuid::new_v4(),
            artifact: FinalArtifact::new("# Ownership\n\n- Each value has one owner\n"),
            verdict,
            failures,
            stats: RunStats {
                segments: 3,
                batches: 1,
                elapsed_secs: 1.5,
                completed_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_markdown_footer() {
        let failures = vec![StageFailure {
            stage: Stage::Summarizing,
            index: 1,
            reason: "quota".into(),
        }];
        let markdown = format_as_markdown(&sample(ValidationVerdict::Approved, failures));

        assert!(markdown.starts_with("# Ownership\n\n- Each value has one owner\n\n---"));
        assert!(markdown.contains("> **Review:** approved"));
        assert!(markdown.contains("1 item(s) fell back to unprocessed text: summarizing#1"));
    }

    #[test]
    fn test_suggestions_are_quoted() {
        let verdict = ValidationVerdict::Suggestions("- add examples\n- fix heading".into());
        let markdown = format_as_markdown(&sample(verdict, vec![]));
        assert!(markdown.contains("> - add examples\n> - fix heading"));
    }

    #[test]
    fn test_json_contains_verdict_and_stats() {
        let json = format_as_json(&sample(ValidationVerdict::Skipped, vec![])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["verdict"]["status"], "skipped");
        assert_eq!(value["stats"]["segments"], 3);
        assert!(value["artifact"].as_str().unwrap().starts_with("# Ownership"));
    }

    #[tokio::test]
    async fn test_saved_notes_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let output = sample(ValidationVerdict::Suggestions("- more detail".into()), vec![]);

        for (name, format) in [("notes.md", OutputFormat::Markdown), ("notes.json", OutputFormat::Json)] {
            let path = dir.path().join(name);
            save_to_file(&output, &path, format).await.unwrap();
            let notes = load_notes(&path).unwrap();
            assert_eq!(notes.as_str().trim(), output.artifact.as_str().trim());
        }
    }

    #[test]
    fn test_plain_markdown_loads_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handwritten.md");
        fs_err::write(&path, "# My notes\n\n---\n\nmore").unwrap();
        assert_eq!(load_notes(&path).unwrap().as_str(), "# My notes\n\n---\n\nmore");
    }
}
