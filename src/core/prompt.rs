use crate::config::Config;
use crate::core::scores::{DRY_HEADING, SOLID_HEADING};

/// Listing used when no SOLID principle is enabled.
pub const NO_PRINCIPLES: &str = "no specific principles";

const PRINCIPLE_SEPARATOR: &str = ", ";

const KNOWN_PRINCIPLES: [(&str, &str); 5] = [
    ("srp", "Single Responsibility Principle (SRP)"),
    ("ocp", "Open/Closed Principle (OCP)"),
    ("lsp", "Liskov Substitution Principle (LSP)"),
    ("isp", "Interface Segregation Principle (ISP)"),
    ("dip", "Dependency Inversion Principle (DIP)"),
];

const SYSTEM_PROMPT: &str = "You are an experienced software engineer reviewing source files for maintainability. You grade code against the DRY and SOLID principles and always answer in the exact format you are asked for.";

/// Renders the per-file analysis request. Output depends only on the
/// source text and the configuration.
pub struct PromptBuilder<'a> {
    config: &'a Config,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn system_prompt(&self) -> String {
        SYSTEM_PROMPT.to_string()
    }

    pub fn build(&self, source: &str) -> String {
        let analysis = &self.config.analysis;
        let prompt = &self.config.prompt_customization;
        let fence = code_fence(source);

        let mut output = String::new();
        output.push_str(&format!(
            "Analyze the following {} code for adherence to the DRY and SOLID principles.\n",
            prompt.language_specificity
        ));
        output.push_str(
            "Give each a score on a scale of 1 to 10, where 10 means full adherence, and justify each score briefly.\n",
        );
        output.push_str(&format!(
            "Explanation detail: {}. Context depth: {}.\n\n",
            prompt.explanation_detail, prompt.context_depth
        ));

        output.push_str(&format!(
            "## DRY (Don't Repeat Yourself): {} emphasis{}\n",
            percent(analysis.dry.weight),
            disabled_note(analysis.dry.enabled)
        ));
        if !analysis.dry.focus_areas.is_empty() {
            let areas: Vec<String> = analysis
                .dry
                .focus_areas
                .iter()
                .map(|(name, weight)| format!("{} ({})", name.replace('_', " "), percent(*weight)))
                .collect();
            output.push_str(&format!("Focus areas: {}.\n", areas.join(", ")));
        }
        output.push('\n');

        output.push_str(&format!(
            "## SOLID: {} emphasis{}\n",
            percent(analysis.solid.weight),
            disabled_note(analysis.solid.enabled)
        ));
        output.push_str(&format!(
            "Principles to evaluate: {}.\n\n",
            self.principle_listing()
        ));

        output.push_str("## Code\n");
        output.push_str(&format!(
            "{}{}\n{}\n{}\n\n",
            fence,
            prompt.language_specificity,
            source.trim_end_matches('\n'),
            fence
        ));

        output.push_str("Respond using exactly this format:\n\n");
        output.push_str(&format!(
            "{}\n**Score: N/10**\n<brief justification>\n\n{}\n**Score: N/10**\n<brief justification>\n",
            DRY_HEADING, SOLID_HEADING
        ));

        output
    }

    /// Enabled principles in canonical order, followed by any other
    /// configured names alphabetically.
    pub fn principle_listing(&self) -> String {
        let principles = &self.config.analysis.solid.principles;
        let enabled = |key: &str| principles.get(key).map_or(false, |p| p.enabled);

        let mut names: Vec<String> = KNOWN_PRINCIPLES
            .iter()
            .filter(|(key, _)| enabled(*key))
            .map(|(_, label)| label.to_string())
            .collect();

        names.extend(
            principles
                .iter()
                .filter(|(key, p)| {
                    p.enabled && !KNOWN_PRINCIPLES.iter().any(|(k, _)| *k == key.as_str())
                })
                .map(|(key, _)| key.to_uppercase()),
        );

        if names.is_empty() {
            NO_PRINCIPLES.to_string()
        } else {
            names.join(PRINCIPLE_SEPARATOR)
        }
    }
}

fn percent(weight: f64) -> String {
    format!("{:.0}%", weight * 100.0)
}

fn disabled_note(enabled: bool) -> &'static str {
    if enabled {
        ""
    } else {
        " (not weighted in this review, score for reference only)"
    }
}

/// A backtick fence longer than any backtick run inside the source.
fn code_fence(source: &str) -> String {
    let longest = source
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrincipleConfig;

    #[test]
    fn states_weights_as_percentages() {
        let config = Config::default();
        let prompt = PromptBuilder::new(&config).build("print(1)");

        assert!(prompt.contains("## DRY (Don't Repeat Yourself): 60% emphasis\n"));
        assert!(prompt.contains("## SOLID: 40% emphasis\n"));
        assert!(prompt.contains("1 to 10"));
    }

    #[test]
    fn lists_only_enabled_principles_in_canonical_order() {
        let config = Config::default();
        let listing = PromptBuilder::new(&config).principle_listing();

        assert_eq!(
            listing,
            "Single Responsibility Principle (SRP), Open/Closed Principle (OCP), Dependency Inversion Principle (DIP)"
        );
    }

    #[test]
    fn no_enabled_principles_uses_fixed_phrase() {
        let mut config = Config::default();
        for principle in config.analysis.solid.principles.values_mut() {
            principle.enabled = false;
        }
        let prompt = PromptBuilder::new(&config).build("x = 1");

        assert!(prompt.contains("Principles to evaluate: no specific principles.\n"));
    }

    #[test]
    fn unknown_principles_follow_known_ones() {
        let mut config = Config::default();
        config.analysis.solid.principles.insert(
            "yagni".to_string(),
            PrincipleConfig {
                enabled: true,
                weight: None,
            },
        );
        let listing = PromptBuilder::new(&config).principle_listing();

        assert!(listing.ends_with("Dependency Inversion Principle (DIP), YAGNI"));
    }

    #[test]
    fn fences_the_source_and_fixes_the_output_headings() {
        let config = Config::default();
        let prompt = PromptBuilder::new(&config).build("def f():\n    return 1\n");

        assert!(prompt.contains("```python\ndef f():\n    return 1\n```\n"));
        assert!(prompt.contains("### DRY Analysis\n**Score: N/10**"));
        assert!(prompt.contains("### SOLID Analysis\n**Score: N/10**"));
    }

    #[test]
    fn fence_outgrows_backticks_in_source() {
        let config = Config::default();
        let prompt = PromptBuilder::new(&config).build("s = '```'");

        assert!(prompt.contains("````python\ns = '```'\n````"));
    }

    #[test]
    fn build_is_deterministic() {
        let config = Config::default();
        let builder = PromptBuilder::new(&config);
        assert_eq!(builder.build("a = 1"), builder.build("a = 1"));
    }

    #[test]
    fn disabled_section_is_marked() {
        let mut config = Config::default();
        config.analysis.dry.enabled = false;
        let prompt = PromptBuilder::new(&config).build("a = 1");

        assert!(prompt.contains("60% emphasis (not weighted in this review"));
    }
}
