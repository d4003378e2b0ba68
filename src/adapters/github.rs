use crate::adapters::source::{CommentPoster, FileSource, SourceFile};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Thin authenticated wrapper over the GitHub REST API.
pub struct GitHubApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

impl GitHubApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("quality-bot/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("GitHub API URL cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => builder.header("Authorization", format!("token {}", token)),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .request(Method::GET, url.clone())
            .send()
            .await
            .with_context(|| format!("GitHub request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub API error: {} {}", status, body.trim());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse GitHub response from {}", url))
    }
}

/// Lists the files of one branch that end with a given extension.
pub struct GitHubFileSource {
    api: GitHubApi,
    repo: String,
    branch: String,
    extension: String,
}

impl GitHubFileSource {
    pub fn new(
        api: GitHubApi,
        repo: impl Into<String>,
        branch: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let source = Self {
            api,
            repo: repo.into(),
            branch: branch.into(),
            extension: extension.into(),
        };
        if !source.api.has_token() {
            warn!("GITHUB_TOKEN is not set; only public repositories can be read");
        }
        info!(
            "Initialized GitHub file source for repo: {}, branch: {}",
            source.repo, source.branch
        );
        source
    }

    async fn fetch_tree(&self) -> Result<TreeResponse> {
        let (owner, name) = split_repo(&self.repo)?;
        let mut url = self
            .api
            .url(&["repos", owner, name, "git", "trees", self.branch.as_str()])?;
        url.query_pairs_mut().append_pair("recursive", "1");
        self.api.get_json(url).await
    }

    async fn fetch_content(&self, path: &str) -> Result<String> {
        let (owner, name) = split_repo(&self.repo)?;
        let mut segments = vec!["repos", owner, name, "contents"];
        segments.extend(path.split('/'));
        let mut url = self.api.url(&segments)?;
        url.query_pairs_mut().append_pair("ref", &self.branch);

        let response: ContentResponse = self.api.get_json(url).await?;
        match response.encoding.as_deref() {
            Some("base64") => decode_content(response.content.as_deref().unwrap_or_default()),
            other => bail!(
                "unsupported content encoding {:?} (file may be too large for the contents API)",
                other
            ),
        }
    }
}

#[async_trait]
impl FileSource for GitHubFileSource {
    async fn get_files(&self) -> Vec<SourceFile> {
        let tree = match self.fetch_tree().await {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Error fetching repository files: {:#}", e);
                return Vec::new();
            }
        };

        if tree.truncated {
            warn!(
                "Repository tree for {} is truncated; some files will not be analyzed",
                self.repo
            );
        }

        let mut files = Vec::new();
        for entry in tree
            .tree
            .iter()
            .filter(|e| e.kind == "blob" && e.path.ends_with(&self.extension))
        {
            match self.fetch_content(&entry.path).await {
                Ok(content) if content.is_empty() => debug!("Skipping empty file {}", entry.path),
                Ok(content) => files.push(SourceFile::new(&entry.path, content)),
                Err(e) => warn!("Unable to fetch content for {}: {:#}", entry.path, e),
            }
        }

        if files.is_empty() {
            warn!("No {} files found in the repository", self.extension);
        } else {
            info!("Fetched {} {} file(s) from {}", files.len(), self.extension, self.repo);
        }
        files
    }
}

/// Posts feedback as an issue comment on the current pull request.
pub struct PullRequestCommenter {
    api: GitHubApi,
    repository: Option<String>,
    pr_number: Option<u64>,
}

impl PullRequestCommenter {
    pub fn new(api: GitHubApi, repository: Option<String>, pr_number: Option<u64>) -> Self {
        Self {
            api,
            repository,
            pr_number,
        }
    }

    /// Reports every missing piece of context, not just the first.
    fn validate(&self) -> bool {
        let mut valid = true;
        if self.pr_number.is_none() {
            warn!("No PR number found. Is this running in a pull request context?");
            valid = false;
        }
        if self.repository.is_none() {
            warn!("GITHUB_REPOSITORY is not set; cannot tell where to comment");
            valid = false;
        }
        if !self.api.has_token() {
            warn!("GITHUB_TOKEN is not set; cannot post the comment");
            valid = false;
        }
        valid
    }

    async fn send(&self, repository: &str, pr_number: u64, body: &str) -> Result<bool> {
        let (owner, name) = split_repo(repository)?;
        let number = pr_number.to_string();
        let url = self
            .api
            .url(&["repos", owner, name, "issues", number.as_str(), "comments"])?;

        let response = self
            .api
            .request(Method::POST, url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .context("Failed to send comment to GitHub")?;

        let status = response.status();
        if status == StatusCode::CREATED {
            info!("Successfully posted PR comment to {}#{}", repository, pr_number);
            Ok(true)
        } else {
            let text = response.text().await.unwrap_or_default();
            warn!("Failed to post comment: {} {}", status, text.trim());
            Ok(false)
        }
    }
}

#[async_trait]
impl CommentPoster for PullRequestCommenter {
    async fn post_comment(&self, body: &str) -> bool {
        if !self.validate() {
            return false;
        }
        let (Some(repository), Some(pr_number)) = (self.repository.as_deref(), self.pr_number)
        else {
            return false;
        };

        match self.send(repository, pr_number, body).await {
            Ok(posted) => posted,
            Err(e) => {
                warn!("Failed to post comment: {:#}", e);
                false
            }
        }
    }
}

fn split_repo(repo: &str) -> Result<(&str, &str)> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
        _ => bail!("repository must look like `owner/name`, got `{}`", repo),
    }
}

/// GitHub wraps base64 content at 60 columns, so whitespace goes first.
fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .context("content is not valid base64")?;
    String::from_utf8(bytes).context("content is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn encoded(text: &str) -> String {
        let raw = base64::engine::general_purpose::STANDARD.encode(text);
        let (head, tail) = raw.split_at(raw.len() / 2);
        format!("{}\n{}", head, tail)
    }

    fn content_body(text: &str) -> String {
        serde_json::json!({ "content": encoded(text), "encoding": "base64" }).to_string()
    }

    fn source_for(server: &Server) -> GitHubFileSource {
        let api = GitHubApi::new(server.url(), Some("gh-token".to_string())).unwrap();
        GitHubFileSource::new(api, "test/repo", "main", ".py")
    }

    #[tokio::test]
    async fn fetches_matching_blobs_in_tree_order() {
        let mut server = Server::new_async().await;
        let tree = server
            .mock("GET", "/repos/test/repo/git/trees/main")
            .match_query(Matcher::UrlEncoded("recursive".into(), "1".into()))
            .match_header("authorization", "token gh-token")
            .with_status(200)
            .with_body(
                r#"{"tree":[
                    {"path":"src/b.py","type":"blob"},
                    {"path":"README.md","type":"blob"},
                    {"path":"src","type":"tree"},
                    {"path":"a.py","type":"blob"}
                ],"truncated":false}"#,
            )
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/repos/test/repo/contents/src/b.py")
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .with_status(200)
            .with_body(content_body("def b():\n    return 2\n"))
            .create_async()
            .await;
        let _a = server
            .mock("GET", "/repos/test/repo/contents/a.py")
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .with_status(200)
            .with_body(content_body("print(1)"))
            .create_async()
            .await;

        let files = source_for(&server).get_files().await;
        tree.assert_async().await;
        assert_eq!(
            files,
            vec![
                SourceFile::new("src/b.py", "def b():\n    return 2\n"),
                SourceFile::new("a.py", "print(1)"),
            ]
        );
    }

    #[tokio::test]
    async fn tree_failure_yields_no_files() {
        let mut server = Server::new_async().await;
        let _tree = server
            .mock("GET", "/repos/test/repo/git/trees/main")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        assert!(source_for(&server).get_files().await.is_empty());
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped() {
        let mut server = Server::new_async().await;
        let _tree = server
            .mock("GET", "/repos/test/repo/git/trees/main")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"tree":[{"path":"bad.py","type":"blob"},{"path":"good.py","type":"blob"}]}"#)
            .create_async()
            .await;
        let _bad = server
            .mock("GET", "/repos/test/repo/contents/bad.py")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let _good = server
            .mock("GET", "/repos/test/repo/contents/good.py")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(content_body("x = 1"))
            .create_async()
            .await;

        let files = source_for(&server).get_files().await;
        assert_eq!(files, vec![SourceFile::new("good.py", "x = 1")]);
    }

    #[tokio::test]
    async fn posts_comment_to_the_pull_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/test/repo/issues/123/comments")
            .match_header("authorization", "token gh-token")
            .match_body(Matcher::Json(serde_json::json!({ "body": "Test comment" })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let api = GitHubApi::new(server.url(), Some("gh-token".to_string())).unwrap();
        let commenter = PullRequestCommenter::new(api, Some("test/repo".to_string()), Some(123));

        assert!(commenter.post_comment("Test comment").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_comment_reports_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/test/repo/issues/5/comments")
            .with_status(403)
            .with_body(r#"{"message":"Resource not accessible by integration"}"#)
            .create_async()
            .await;

        let api = GitHubApi::new(server.url(), Some("gh-token".to_string())).unwrap();
        let commenter = PullRequestCommenter::new(api, Some("test/repo".to_string()), Some(5));
        assert!(!commenter.post_comment("body").await);
    }

    #[tokio::test]
    async fn missing_context_short_circuits() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let no_pr = PullRequestCommenter::new(
            GitHubApi::new(server.url(), Some("gh-token".to_string())).unwrap(),
            Some("test/repo".to_string()),
            None,
        );
        assert!(!no_pr.post_comment("body").await);

        let no_token = PullRequestCommenter::new(
            GitHubApi::new(server.url(), None).unwrap(),
            Some("test/repo".to_string()),
            Some(1),
        );
        assert!(!no_token.post_comment("body").await);

        let no_repo = PullRequestCommenter::new(
            GitHubApi::new(server.url(), Some("gh-token".to_string())).unwrap(),
            None,
            Some(1),
        );
        assert!(!no_repo.post_comment("body").await);

        mock.assert_async().await;
    }

    #[test]
    fn decodes_wrapped_base64() {
        assert_eq!(decode_content(&encoded("hello world")).unwrap(), "hello world");
        assert!(decode_content("***").is_err());
    }

    #[test]
    fn repo_must_have_owner_and_name() {
        assert_eq!(split_repo("a/b").unwrap(), ("a", "b"));
        assert!(split_repo("nope").is_err());
        assert!(split_repo("/b").is_err());
    }
}
