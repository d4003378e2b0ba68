pub mod github;
pub mod llm;
pub mod openai;
pub mod source;

pub use github::{GitHubApi, GitHubFileSource, PullRequestCommenter};
pub use openai::OpenAIAdapter;
pub use source::CommentPoster;
