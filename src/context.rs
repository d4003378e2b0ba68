/// Everything a run needs from its environment, gathered once at startup.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub enabled: bool,
    /// Repository to analyze, `owner/name`.
    pub repo: Option<String>,
    pub branch: String,
    pub extension: String,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    /// Repository the pull request lives in, `owner/name`.
    pub github_repository: Option<String>,
    pub github_ref: Option<String>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            enabled: true,
            repo: None,
            branch: "main".to_string(),
            extension: ".py".to_string(),
            github_token: None,
            github_api_url: "https://api.github.com".to_string(),
            openai_api_key: None,
            openai_base_url: None,
            github_repository: None,
            github_ref: None,
        }
    }
}

impl RunContext {
    pub fn pr_number(&self) -> Option<u64> {
        self.github_ref.as_deref().and_then(pr_number_from_ref)
    }
}

/// Parses the pull request number out of a ref such as `refs/pull/123/merge`.
pub fn pr_number_from_ref(git_ref: &str) -> Option<u64> {
    let mut parts = git_ref.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("refs"), Some("pull"), Some(number)) => number.parse().ok(),
        _ => None,
    }
}

/// Accepts the same spellings as the `ENABLE_ANALYSIS` switch: only `true`,
/// in any case, turns analysis on.
pub fn parse_toggle(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pull_request_refs() {
        assert_eq!(pr_number_from_ref("refs/pull/123/merge"), Some(123));
        assert_eq!(pr_number_from_ref("refs/pull/7/head"), Some(7));
        assert_eq!(pr_number_from_ref("refs/heads/main"), None);
        assert_eq!(pr_number_from_ref("refs/pull/abc/merge"), None);
        assert_eq!(pr_number_from_ref(""), None);
    }

    #[test]
    fn context_reads_pr_from_ref() {
        let context = RunContext {
            github_ref: Some("refs/pull/42/merge".to_string()),
            ..RunContext::default()
        };
        assert_eq!(context.pr_number(), Some(42));
        assert_eq!(RunContext::default().pr_number(), None);
    }

    #[test]
    fn toggle_only_accepts_true() {
        assert!(parse_toggle("true"));
        assert!(parse_toggle("TRUE "));
        assert!(!parse_toggle("false"));
        assert!(!parse_toggle("1"));
    }
}
