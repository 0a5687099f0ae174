use anyhow::Context;
use blog_pipeline::extract::ArticleExtractor;
use blog_pipeline::publisher::GITHUB_TOKEN_VAR;
use blog_pipeline::{
    FetchConfig, Fetcher, GitPublisher, LlmConfig, LocalPublisher, OpenAiAdapter, Orchestrator, OrchestratorConfig,
    PipelineError, PublishOutcome, PublishTarget, Publisher, PublisherConfig, RssFeedSource, StageTimeouts, Summarizer,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Parser)]
#[command(name = "blogenetes")]
#[command(about = "Summarize the latest feed article and publish it as a blog post")]
struct Cli {
    /// Feed URLs, comma separated
    #[arg(long, env = "RSS_URLS", value_delimiter = ',', required = true)]
    rss: Vec<String>,

    /// Repository owner
    #[arg(long, required_unless_present = "output_dir")]
    owner: Option<String>,

    /// Repository name
    #[arg(long, required_unless_present = "output_dir")]
    repo: Option<String>,

    #[arg(long, default_value = PublishTarget::DEFAULT_BRANCH)]
    branch: String,

    /// File path inside the repository; `{date}` and `{slug}` are expanded
    #[arg(long, default_value = "posts/post.md")]
    path: String,

    /// Commit message
    #[arg(long, default_value = "New post via agent")]
    message: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// Summarize without calling an LLM
    #[arg(long)]
    no_llm: bool,

    /// Fetch the article page when the feed item has no text
    #[arg(long)]
    fetch_article: bool,

    /// Write the post into this directory instead of pushing it
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Per-request feed timeout; the fetch stage allows for every retry
    #[arg(long, default_value_t = 30)]
    fetch_timeout_secs: u64,

    #[arg(long, default_value_t = 60)]
    llm_timeout_secs: u64,

    #[arg(long, default_value_t = 120)]
    publish_timeout_secs: u64,
}

struct Run {
    orchestrator: Orchestrator,
    feed_urls: Vec<String>,
    target: PublishTarget,
}

fn credential(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(cli: Cli) -> anyhow::Result<Run> {
    let feed_urls: Vec<String> = cli
        .rss
        .iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();
    if feed_urls.is_empty() {
        return Err(PipelineError::Config("at least one feed URL is required".to_string()).into());
    }

    let fetch_config = FetchConfig {
        timeout_seconds: cli.fetch_timeout_secs,
        ..FetchConfig::default()
    };
    let timeouts = StageTimeouts::for_run(
        &fetch_config,
        feed_urls.len(),
        cli.llm_timeout_secs,
        cli.publish_timeout_secs,
    );
    let fetcher = Arc::new(Fetcher::new(fetch_config).context("failed to set up feed fetcher")?);
    let feed_source = Arc::new(RssFeedSource::with_fetcher(fetcher.clone()));

    let summarizer = if cli.no_llm {
        info!("LLM disabled, summaries use the sentence fallback");
        Summarizer::fallback_only()
    } else {
        let api_key = credential(OPENAI_API_KEY_VAR).ok_or_else(|| PipelineError::auth_missing(OPENAI_API_KEY_VAR))?;
        let llm_config = LlmConfig {
            base_url: cli.llm_base_url.clone(),
            model: cli.model.clone(),
            timeout_seconds: cli.llm_timeout_secs,
            ..LlmConfig::new(api_key)
        };
        Summarizer::new(Arc::new(OpenAiAdapter::new(llm_config)?))
    };

    let token = match &cli.output_dir {
        Some(_) => None,
        None => Some(credential(GITHUB_TOKEN_VAR).ok_or_else(|| PipelineError::auth_missing(GITHUB_TOKEN_VAR))?),
    };
    let publisher: Arc<dyn Publisher> = match &cli.output_dir {
        Some(dir) => Arc::new(LocalPublisher::new(dir)),
        None => Arc::new(GitPublisher::new(PublisherConfig::default())),
    };

    let config = OrchestratorConfig {
        timeouts,
        credential: token,
    };

    let mut orchestrator = Orchestrator::new(feed_source, Arc::new(summarizer), publisher, config);
    if cli.fetch_article {
        orchestrator = orchestrator.with_article_extractor(Arc::new(ArticleExtractor::new(fetcher)));
    }

    let target = PublishTarget::new(cli.owner.unwrap_or_default(), cli.repo.unwrap_or_default())
        .with_branch(cli.branch)
        .with_path(cli.path)
        .with_message(cli.message);

    Ok(Run {
        orchestrator,
        feed_urls,
        target,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let run = match build(cli) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match run.orchestrator.run(&run.feed_urls, &run.target).await {
        Ok(report) => {
            match &report.outcome {
                PublishOutcome::Committed { commit } => {
                    println!("Published \"{}\" to {} ({})", report.article_title, report.document_path, commit)
                }
                PublishOutcome::Written { location } => {
                    println!("Wrote \"{}\" to {}", report.article_title, location)
                }
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("{}", failure);
            ExitCode::from(1)
        }
    }
}
