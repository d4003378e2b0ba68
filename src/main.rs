mod adapters;
mod config;
mod context;
mod core;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::llm::ModelConfig;
use crate::adapters::CommentPoster;
use crate::context::RunContext;

#[derive(Parser)]
#[command(name = "quality-bot")]
#[command(about = "Scores repository code for DRY and SOLID adherence and reports it on pull requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, env = "QUALITY_BOT_CONFIG", help = "Path to the YAML configuration file")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "auto",
        help = "Write logs to FILE instead of stderr (`auto` picks logs/app-<timestamp>.log)"
    )]
    log_file: Option<String>,

    #[command(flatten)]
    env: EnvArgs,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Analyze the repository and save the results to the feedback file")]
    Analyze,
    #[command(about = "Post analysis feedback to the current pull request")]
    Comment {
        #[arg(long, help = "Print the feedback instead of posting it")]
        dry_run: bool,
    },
    #[command(about = "Show the merged configuration and report missing sections")]
    CheckConfig,
}

#[derive(Args)]
struct EnvArgs {
    #[arg(long, global = true, env = "ENABLE_ANALYSIS", default_value = "true")]
    enable_analysis: String,

    #[arg(long, global = true, env = "REPO", help = "Repository to analyze (owner/name)")]
    repo: Option<String>,

    #[arg(long, global = true, env = "GITHUB_BRANCH", default_value = "main")]
    branch: String,

    #[arg(long, global = true, default_value = ".py", help = "Only analyze files ending with this")]
    extension: String,

    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long, global = true, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    github_api_url: String,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    #[arg(long, global = true, env = "GITHUB_REPOSITORY")]
    github_repository: Option<String>,

    #[arg(long, global = true, env = "GITHUB_REF")]
    github_ref: Option<String>,
}

impl From<EnvArgs> for RunContext {
    fn from(args: EnvArgs) -> Self {
        Self {
            enabled: context::parse_toggle(&args.enable_analysis),
            repo: args.repo,
            branch: args.branch,
            extension: args.extension,
            github_token: args.github_token,
            github_api_url: args.github_api_url,
            openai_api_key: args.openai_api_key,
            openai_base_url: args.openai_base_url,
            github_repository: args.github_repository,
            github_ref: args.github_ref,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let store = config::ConfigStore::new(cli.config.clone());
    let config = store.load();
    let user_complete = store.validate_user();
    let run_context = RunContext::from(cli.env);

    match cli.command {
        Commands::Analyze => {
            analyze_command(config, run_context).await?;
        }
        Commands::Comment { dry_run } => {
            comment_command(config, run_context, dry_run).await?;
        }
        Commands::CheckConfig => {
            check_config_command(&store, &config, user_complete)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&str>) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    match log_file {
        Some(name) => {
            let path = if name == "auto" {
                let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
                PathBuf::from("logs").join(format!("app-{}.log", timestamp))
            } else {
                PathBuf::from(name)
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            // stdout is reserved for command output
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

fn build_adapter(config: &config::Config, run_context: &RunContext) -> Result<adapters::OpenAIAdapter> {
    let model_config = ModelConfig {
        api_key: run_context.openai_api_key.clone(),
        base_url: run_context.openai_base_url.clone(),
        ..ModelConfig::from_config(config)
    };
    adapters::OpenAIAdapter::new(model_config)
}

fn build_file_source(run_context: &RunContext, repo: &str) -> Result<adapters::GitHubFileSource> {
    let api = adapters::GitHubApi::new(
        run_context.github_api_url.clone(),
        run_context.github_token.clone(),
    )?;
    Ok(adapters::GitHubFileSource::new(
        api,
        repo,
        run_context.branch.clone(),
        run_context.extension.clone(),
    ))
}

async fn analyze_command(config: config::Config, run_context: RunContext) -> Result<()> {
    if !run_context.enabled {
        info!("Code analysis is disabled. Exiting.");
        return Ok(());
    }
    let Some(repo) = run_context.repo.as_deref() else {
        warn!("REPO is not set; nothing to analyze");
        return Ok(());
    };

    let adapter = build_adapter(&config, &run_context)?;
    let source = build_file_source(&run_context, repo)?;
    let pipeline = core::AnalysisPipeline::new(&config, &source, &adapter);

    let results = pipeline.run().await;
    if results.is_total_failure() {
        warn!(
            "No file could be analyzed; keeping {}",
            config.output.feedback_file.display()
        );
    } else {
        core::persist_results(&config.output.feedback_file, &results)?;
    }
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}

async fn comment_command(config: config::Config, run_context: RunContext, dry_run: bool) -> Result<()> {
    let fresh_possible = run_context.enabled && run_context.repo.is_some();
    if !run_context.enabled {
        info!("Code analysis is disabled; using cached feedback if present");
    } else if run_context.repo.is_none() {
        warn!("REPO is not set; using cached feedback if present");
    }

    // A missing model key is fatal only when a fresh run was requested.
    let adapter = if fresh_possible {
        Some(build_adapter(&config, &run_context)?)
    } else {
        None
    };
    let source = match run_context.repo.as_deref() {
        Some(repo) if fresh_possible => Some(build_file_source(&run_context, repo)?),
        _ => None,
    };

    let pipeline = match (&source, &adapter) {
        (Some(source), Some(adapter)) => Some(core::AnalysisPipeline::new(&config, source, adapter)),
        _ => None,
    };
    let feedback = core::FeedbackAssembler::new(&config, pipeline)
        .get_feedback()
        .await;

    if dry_run {
        println!("{}", feedback);
        return Ok(());
    }

    let api = adapters::GitHubApi::new(
        run_context.github_api_url.clone(),
        run_context.github_token.clone(),
    )?;
    let commenter = adapters::PullRequestCommenter::new(
        api,
        run_context.github_repository.clone(),
        run_context.pr_number(),
    );
    if !commenter.post_comment(&feedback).await {
        warn!("Feedback was not posted");
    }

    Ok(())
}

fn check_config_command(
    store: &config::ConfigStore,
    config: &config::Config,
    user_complete: bool,
) -> Result<()> {
    match store.user_path() {
        Some(path) => println!("# user configuration: {}", path.display()),
        None => println!("# user configuration: none (built-in defaults)"),
    }
    if !user_complete {
        println!("# sections missing from the user file use built-in defaults");
    }
    print!(
        "{}",
        serde_yaml::to_string(config).context("Failed to render configuration")?
    );
    Ok(())
}
