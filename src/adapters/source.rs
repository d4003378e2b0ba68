use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Enumerates the files to analyze. Implementations log their own
/// failures and return whatever they managed to fetch.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn get_files(&self) -> Vec<SourceFile>;
}

/// Publishes feedback somewhere a reviewer will see it.
#[async_trait]
pub trait CommentPoster: Send + Sync {
    async fn post_comment(&self, body: &str) -> bool;
}
