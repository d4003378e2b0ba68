use crate::core::analysis::{AnalysisResult, AnalysisResults};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Feedback text used when there is nothing to report.
pub const NO_FEEDBACK: &str = "No analysis feedback generated.";

/// Renders analysis results through the configured message template.
///
/// Recognized placeholders are `{file}`, `{dry_score}`, `{dry_analysis}`,
/// `{solid_score}` and `{solid_analysis}`; `{{` and `}}` render literal
/// braces. Unknown placeholders are left untouched, and substituted text is
/// never scanned again, so a response containing `{file}` stays verbatim.
pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format_one(path: &str, result: &AnalysisResult, template: &str) -> String {
        static PLACEHOLDER: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\{\{|\}\}|\{(\w+)\}").unwrap());

        PLACEHOLDER
            .replace_all(template, |caps: &Captures| {
                let whole = &caps[0];
                match whole {
                    "{{" => return "{".to_string(),
                    "}}" => return "}".to_string(),
                    _ => {}
                }
                match caps.get(1).map(|m| m.as_str()) {
                    Some("file") => path.to_string(),
                    Some("dry_score") => result.scores.dry.to_string(),
                    Some("solid_score") => result.scores.solid.to_string(),
                    // The response is not split per principle, both get the full text.
                    Some("dry_analysis") | Some("solid_analysis") => result.full_analysis.clone(),
                    _ => whole.to_string(),
                }
            })
            .into_owned()
    }

    pub fn format_all(results: &AnalysisResults, template: &str) -> String {
        if results.is_empty() {
            return NO_FEEDBACK.to_string();
        }

        results
            .iter()
            .map(|result| Self::format_one(&result.path, result, template))
            .collect()
    }
}
