use crate::adapters::llm::{LLMAdapter, LLMRequest};
use crate::adapters::source::{FileSource, SourceFile};
use crate::config::Config;
use crate::core::analysis::{AnalysisResult, AnalysisResults};
use crate::core::prompt::PromptBuilder;
use crate::core::scores::ScoreExtractor;
use tracing::{debug, info, warn};

/// Runs every file from the source through the model, one at a time.
pub struct AnalysisPipeline<'a> {
    config: &'a Config,
    source: &'a dyn FileSource,
    llm: &'a dyn LLMAdapter,
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(config: &'a Config, source: &'a dyn FileSource, llm: &'a dyn LLMAdapter) -> Self {
        Self {
            config,
            source,
            llm,
        }
    }

    /// A model failure on one file is recorded in that file's result and
    /// does not stop the run.
    pub async fn run(&self) -> AnalysisResults {
        let files = self.source.get_files().await;
        info!(
            "Analyzing {} file(s) with model: {}",
            files.len(),
            self.llm.model_name()
        );

        let builder = PromptBuilder::new(self.config);
        let mut results = AnalysisResults::new();
        for file in &files {
            results.insert(self.analyze_file(&builder, file).await);
        }

        let failed = results.failed_count();
        if failed > 0 {
            warn!("{} of {} file(s) could not be analyzed", failed, results.len());
        }
        results
    }

    async fn analyze_file(&self, builder: &PromptBuilder<'_>, file: &SourceFile) -> AnalysisResult {
        let request = LLMRequest {
            system_prompt: builder.system_prompt(),
            user_prompt: builder.build(&file.content),
            temperature: None,
            max_tokens: None,
        };

        match self.llm.complete(request).await {
            Ok(response) => {
                let scores = ScoreExtractor::extract(&response.content);
                debug!(
                    "{}: DRY {} / SOLID {}",
                    file.path, scores.dry, scores.solid
                );
                AnalysisResult::new(&file.path, scores, response.content)
            }
            Err(e) => {
                warn!("Failed to analyze {}: {:#}", file.path, e);
                AnalysisResult::failure(&file.path, format!("Error analyzing code: {:#}", e))
            }
        }
    }
}
