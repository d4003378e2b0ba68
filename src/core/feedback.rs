use crate::config::Config;
use crate::core::analysis::AnalysisResults;
use crate::core::formatter::{ResultFormatter, NO_FEEDBACK};
use crate::core::pipeline::AnalysisPipeline;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// Produces the comment body: fresh analysis first, then the cached
/// feedback file, then a fixed sentinel.
pub struct FeedbackAssembler<'a> {
    config: &'a Config,
    pipeline: Option<AnalysisPipeline<'a>>,
}

impl<'a> FeedbackAssembler<'a> {
    /// `pipeline` is `None` when a fresh run is not possible at all, for
    /// example when analysis is switched off.
    pub fn new(config: &'a Config, pipeline: Option<AnalysisPipeline<'a>>) -> Self {
        Self { config, pipeline }
    }

    pub async fn get_feedback(&self) -> String {
        if let Some(feedback) = self.fresh_feedback().await {
            return feedback;
        }
        if let Some(feedback) = self.cached_feedback() {
            return feedback;
        }
        info!("No fresh or cached analysis available");
        NO_FEEDBACK.to_string()
    }

    async fn fresh_feedback(&self) -> Option<String> {
        let Some(pipeline) = &self.pipeline else {
            debug!("Fresh analysis not available, skipping to cached feedback");
            return None;
        };

        let results = pipeline.run().await;
        if results.is_total_failure() {
            warn!(
                "Fresh analysis produced no usable results ({} file(s)), falling back to cached feedback",
                results.len()
            );
            return None;
        }

        if let Err(e) = persist_results(&self.config.output.feedback_file, &results) {
            warn!("{:#}", e);
        }

        Some(ResultFormatter::format_all(
            &results,
            &self.config.feedback_format.message_template,
        ))
    }

    fn cached_feedback(&self) -> Option<String> {
        let path = &self.config.output.feedback_file;
        match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => {
                debug!("Cached feedback at {} is empty", path.display());
                None
            }
            Ok(content) => {
                info!("Using cached feedback from {}", path.display());
                Some(content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cached feedback at {}", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to read cached feedback {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Overwrites `path` with one section per file: a heading and the result
/// as pretty-printed JSON.
pub fn persist_results(path: &Path, results: &AnalysisResults) -> Result<()> {
    let document = render_results(results)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, document)
        .with_context(|| format!("Failed to write analysis results to {}", path.display()))?;

    info!("Saved {} result(s) to {}", results.len(), path.display());
    Ok(())
}

fn render_results(results: &AnalysisResults) -> Result<String> {
    let mut output = String::new();
    for result in results.iter() {
        let json = serde_json::to_string_pretty(result)?;
        output.push_str(&format!("## {}\n\n```json\n{}\n```\n\n", result.path, json));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::SourceFile;
    use crate::core::analysis::AnalysisResult;
    use crate::core::pipeline::test_support::{ScriptedLlm, StaticSource, WELL_FORMED};
    use crate::core::scores::{Score, ScorePair};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.output.feedback_file = dir.path().join("analysis_feedback.md");
        config
    }

    fn one_file() -> StaticSource {
        StaticSource(vec![SourceFile::new("a.py", "print(1)")])
    }

    #[tokio::test]
    async fn fresh_results_are_formatted_and_persisted() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let source = one_file();
        let llm = ScriptedLlm::answering(WELL_FORMED);
        let pipeline = AnalysisPipeline::new(&config, &source, &llm);

        let feedback = FeedbackAssembler::new(&config, Some(pipeline)).get_feedback().await;

        assert!(feedback.starts_with("## Analysis for a.py\n"));
        assert!(feedback.contains("### DRY Score: 8/10"));
        assert!(feedback.contains("### SOLID Score: 7/10"));

        let saved = std::fs::read_to_string(&config.output.feedback_file).unwrap();
        assert!(saved.starts_with("## a.py\n\n```json\n"));
        assert!(saved.contains("\"dry_score\": 8"));
    }

    #[tokio::test]
    async fn falls_back_to_cache_when_the_model_always_fails() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.output.feedback_file, "cached").unwrap();
        let source = one_file();
        let llm = ScriptedLlm::failing();
        let pipeline = AnalysisPipeline::new(&config, &source, &llm);

        let feedback = FeedbackAssembler::new(&config, Some(pipeline)).get_feedback().await;

        assert_eq!(feedback, "cached");
        assert_eq!(
            std::fs::read_to_string(&config.output.feedback_file).unwrap(),
            "cached"
        );
    }

    #[tokio::test]
    async fn sentinel_when_nothing_is_available() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let source = one_file();
        let llm = ScriptedLlm::failing();
        let pipeline = AnalysisPipeline::new(&config, &source, &llm);

        let feedback = FeedbackAssembler::new(&config, Some(pipeline)).get_feedback().await;
        assert_eq!(feedback, "No analysis feedback generated.");
    }

    #[tokio::test]
    async fn without_a_pipeline_the_cache_is_used() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.output.feedback_file, "from last run").unwrap();

        let feedback = FeedbackAssembler::new(&config, None).get_feedback().await;
        assert_eq!(feedback, "from last run");
    }

    #[tokio::test]
    async fn blank_cache_counts_as_missing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.output.feedback_file, " \n\n").unwrap();

        let feedback = FeedbackAssembler::new(&config, None).get_feedback().await;
        assert_eq!(feedback, NO_FEEDBACK);
    }

    #[tokio::test]
    async fn partial_failures_still_count_as_fresh() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.output.feedback_file, "cached").unwrap();
        let source = StaticSource(vec![
            SourceFile::new("a.py", "fine = 1"),
            SourceFile::new("b.py", "explode = 1"),
        ]);
        let llm = ScriptedLlm {
            fail_when_prompt_contains: Some("explode".to_string()),
            ..ScriptedLlm::answering(WELL_FORMED)
        };
        let pipeline = AnalysisPipeline::new(&config, &source, &llm);

        let feedback = FeedbackAssembler::new(&config, Some(pipeline)).get_feedback().await;

        assert!(feedback.contains("## Analysis for b.py"));
        assert!(feedback.contains("### DRY Score: N/A/10"));
        assert!(feedback.contains("Error analyzing code:"));
    }

    #[test]
    fn persist_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("feedback.md");
        let mut results = AnalysisResults::new();
        results.insert(AnalysisResult::new(
            "src/a.py",
            ScorePair {
                dry: Score::Value(8),
                solid: Score::Unavailable,
            },
            "text",
        ));
        results.insert(AnalysisResult::failure("b.py", "Error analyzing code: down"));

        persist_results(&path, &results).unwrap();
        let first = std::fs::read(&path).unwrap();
        persist_results(&path, &results).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        let a = text.find("## src/a.py").unwrap();
        let b = text.find("## b.py").unwrap();
        assert!(a < b);
        assert!(text.contains("\"solid_score\": \"N/A\""));
    }

    #[test]
    fn persist_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("feedback.md");
        std::fs::write(&path, "stale content that is much longer than the new one").unwrap();

        persist_results(&path, &AnalysisResults::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
