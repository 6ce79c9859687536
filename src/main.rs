use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reviewbot_core::{AppConfig, FileReview, LlmConfig, OutputFormat, DEFAULT_API_ENDPOINT};
use reviewbot_review::llm::OpenAiTransport;
use reviewbot_review::models::{check_model_support, ModelSupport};
use reviewbot_review::ReviewRequester;

const CONFIG_FILE: &str = ".reviewbot.toml";
const DEFAULT_JOBS: u16 = 4;

#[derive(Parser)]
#[command(
    name = "reviewbot",
    version,
    about = "Per-file AI code review comments",
    long_about = "reviewbot asks an OpenAI-compatible chat model to review each changed file in a diff.\n\n\
                   Every file gets its own request. Diffs that would not fit the token budget\n\
                   are skipped, and files with nothing worth flagging come back as NO_COMMENT.\n\n\
                   Examples:\n  \
                     git diff main | reviewbot review          Review a diff from stdin\n  \
                     reviewbot review --file changes.patch      Review a patch file\n  \
                     reviewbot init                            Create a .reviewbot.toml\n  \
                     reviewbot doctor                          Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .reviewbot.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output (request payloads, endpoint in use)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Review every changed file in a diff
    #[command(long_about = "Review every changed file in a diff.\n\n\
        Reads a unified diff from stdin or a file, splits it per file, and sends one\n\
        chat completion request per file. Requests run concurrently.\n\n\
        Examples:\n  git diff main | reviewbot review\n  reviewbot review --file changes.patch --model gpt-4\n  reviewbot review --fail-on-comment")]
    Review {
        /// Read diff from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
        /// Model to use (overrides [review].model)
        #[arg(long)]
        model: Option<String>,
        /// Base URL of the OpenAI-compatible API (overrides [review].api_endpoint)
        #[arg(long)]
        endpoint: Option<String>,
        /// Token ceiling for prompt plus diff (overrides [review].max_tokens)
        #[arg(long)]
        max_tokens: Option<usize>,
        /// Exit with code 1 if any file received review comments
        #[arg(long)]
        fail_on_comment: bool,
        /// Maximum number of review requests in flight at once
        #[arg(long, default_value_t = DEFAULT_JOBS, value_parser = clap::value_parser!(u16).range(1..))]
        jobs: u16,
    },
    /// Create a default .reviewbot.toml configuration file
    #[command(long_about = "Create a default .reviewbot.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .reviewbot.toml already exists.")]
    Init,
    /// Check your reviewbot setup and environment
    #[command(long_about = "Check your reviewbot setup and environment.\n\n\
        Reports the config file, model, API key, and endpoint. Use --format json\n\
        for machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn default_log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .with(filter)
        .init();
}

fn read_diff_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

fn uses_default_endpoint(endpoint: &str) -> bool {
    endpoint.trim_end_matches('/') == DEFAULT_API_ENDPOINT
}

fn render_text(reviews: &[FileReview], model: &str) -> String {
    use std::fmt::Write;

    let commented = reviews.iter().filter(|r| r.actionable).count();
    let mut out = String::new();
    let _ = writeln!(out, "Review Results");
    let _ = writeln!(out, "==============");
    let _ = writeln!(
        out,
        "Model: {model} | Files: {} | With comments: {commented}\n",
        reviews.len()
    );
    for review in reviews {
        if review.actionable {
            let _ = writeln!(out, "{}:", review.file);
            for line in review.review.trim().lines() {
                let _ = writeln!(out, "  {line}");
            }
            let _ = writeln!(out);
        } else {
            let _ = writeln!(out, "{}: no comment", review.file);
        }
    }
    out
}

fn render_markdown(reviews: &[FileReview]) -> String {
    use std::fmt::Write;

    let mut out = String::from("# Code Review\n\n");
    for review in reviews.iter().filter(|r| r.actionable) {
        let _ = writeln!(out, "## `{}`\n", review.file);
        let _ = writeln!(out, "{}\n", review.review.trim());
    }
    let quiet: Vec<&str> = reviews
        .iter()
        .filter(|r| !r.actionable)
        .map(|r| r.file.as_str())
        .collect();
    if !quiet.is_empty() {
        let _ = writeln!(out, "<details><summary>No comments ({})</summary>\n", quiet.len());
        for file in quiet {
            let _ = writeln!(out, "- `{file}`");
        }
        let _ = writeln!(out, "\n</details>");
    }
    out
}

async fn run_review(
    requester: Arc<ReviewRequester>,
    files: Vec<(String, String)>,
    jobs: usize,
) -> Result<Vec<FileReview>> {
    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .into_diagnostic()?,
        );
        pb.set_message(format!("Reviewing {} files...", files.len()));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let permits = Arc::new(tokio::sync::Semaphore::new(jobs.max(1)));
    let mut tasks = tokio::task::JoinSet::new();
    for (index, (name, diff)) in files.into_iter().enumerate() {
        let requester = Arc::clone(&requester);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let review = requester.perform_code_review(&diff, &name).await;
            (index, FileReview::new(name, review))
        });
    }

    let mut reviews = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        reviews.push(joined.into_diagnostic().wrap_err("review task panicked")?);
    }
    reviews.sort_by_key(|(index, _)| *index);

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    Ok(reviews.into_iter().map(|(_, review)| review).collect())
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn run_doctor(
    config: &AppConfig,
    config_path: &Path,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    if config_path.exists() {
        checks.push(CheckResult::pass(
            "config_file",
            format!("{} found", config_path.display()),
        ));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            format!("{} not found", config_path.display()),
            "run 'reviewbot init' to create a default config",
        ));
    }

    // 2. Model
    let model = config.review.model.trim();
    if model.is_empty() {
        checks.push(CheckResult::fail(
            "model",
            "no model configured",
            "set model under [review] or pass --model to review",
        ));
    } else {
        match check_model_support(model) {
            ModelSupport::Supported => checks.push(CheckResult::pass("model", model)),
            ModelSupport::UnsupportedButProceeding => checks.push(CheckResult::info(
                "model",
                format!("{model} (not officially supported, reviews will still run)"),
            )),
        }
    }

    // 3. API key
    let endpoint = &config.review.api_endpoint;
    if config.llm.resolve_api_key().is_some() {
        checks.push(CheckResult::pass("api_key", "configured"));
    } else if uses_default_endpoint(endpoint) {
        checks.push(CheckResult::fail(
            "api_key",
            "no API key found",
            format!(
                "set {} or add api_key under [llm]",
                LlmConfig::API_KEY_ENV
            ),
        ));
    } else {
        checks.push(CheckResult::info(
            "api_key",
            "not set (custom endpoint may not need one)",
        ));
    }

    // 4. Endpoint and budget
    checks.push(CheckResult::info(
        "endpoint",
        format!("{endpoint} (max tokens: {})", config.review.max_tokens),
    ));

    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("reviewbot v{version}: environment check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<12} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# reviewbot configuration

[review]
# Model sent with every request (required)
model = "gpt-4"
# api_endpoint = "https://api.openai.com/v1"
# Token ceiling for system prompt plus diff; larger diffs are skipped
# max_tokens = 4096
# include_bugs = true
# include_performance = true
# include_best_practices = true
# additional_instructions = ["Flag missing error handling"]

[llm]
# api_key = "sk-..."   # defaults to $OPENAI_API_KEY
# timeout_secs = 120
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None if config_path.exists() => AppConfig::from_file(&config_path)?,
        None => AppConfig::default(),
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help().into_diagnostic()?;
            return Ok(());
        }
        Some(Command::Review {
            ref file,
            ref model,
            ref endpoint,
            max_tokens,
            fail_on_comment,
            jobs,
        }) => {
            // Apply CLI overrides to review config
            let mut review_config = config.review.clone();
            if let Some(model) = model {
                review_config.model = model.clone();
            }
            if let Some(endpoint) = endpoint {
                review_config.api_endpoint = endpoint.clone();
            }
            if let Some(max_tokens) = max_tokens {
                review_config.max_tokens = max_tokens;
            }

            if review_config.model.trim().is_empty() {
                miette::bail!(miette::miette!(
                    help = "Set model under [review] in .reviewbot.toml, or pass --model",
                    "No model configured"
                ));
            }

            if config.llm.resolve_api_key().is_none()
                && uses_default_endpoint(&review_config.api_endpoint)
            {
                miette::bail!(miette::miette!(
                    help = format!(
                        "Set {} or add api_key in your .reviewbot.toml under [llm]",
                        LlmConfig::API_KEY_ENV
                    ),
                    "No API key configured for {}",
                    review_config.api_endpoint
                ));
            }

            let diff_input = read_diff_input(file)?;
            if diff_input.trim().is_empty() {
                miette::bail!(miette::miette!(
                    help = "Pipe a diff to reviewbot, e.g.: git diff main | reviewbot review\n       Or use --file <path>",
                    "Empty diff input"
                ));
            }

            let files: Vec<(String, String)> = reviewbot_difflens::parser::split_unified_diff(&diff_input)?
                .into_iter()
                .filter(|f| f.has_changes())
                .map(|f| (f.display_path().display().to_string(), f.text))
                .collect();

            if cli.verbose {
                eprintln!("Files to review: {}", files.len());
            }

            let transport = OpenAiTransport::new(&review_config.api_endpoint, &config.llm)?;
            let model_name = review_config.model.clone();
            let requester = Arc::new(ReviewRequester::new(review_config, Arc::new(transport))?);

            let reviews = run_review(requester, files, usize::from(jobs)).await?;

            match cli.format {
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "model": model_name,
                        "reviews": reviews,
                    });
                    println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", render_markdown(&reviews)),
                OutputFormat::Text => print!("{}", render_text(&reviews, &model_name)),
            }

            if fail_on_comment && reviews.iter().any(|r| r.actionable) {
                std::process::exit(1);
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor) => {
            run_doctor(&config, &config_path, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "reviewbot", &mut std::io::stdout());
        }
    }

    Ok(())
}
