//! dirguard - Two-sided PII guardrail pipeline for a directory assistant
//!
//! Console chat over a guarded conversational core, plus one-shot policy
//! evaluation for debugging guard behavior.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dirguard::config::{DirguardConfig, OracleKind};
use dirguard::console::Console;
use dirguard::guard::{InputGuard, LlmRedactor, OutputGuard, PatternRedactor, Redactor};
use dirguard::oracle::{ChatClient, OpenAiChatClient};
use dirguard::policy::{LlmPolicyOracle, PatternOracle, Policy, PolicyOracle};
use dirguard::session::{ConversationSession, History};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dirguard")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Two-sided PII guardrail pipeline for a colleague directory assistant")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DIRGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the guarded console chat
    Chat {
        /// Protected profile document seeded into the conversation
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Override the configured policy oracle backend
        #[arg(long, value_enum)]
        oracle: Option<OracleKind>,

        /// Hard-reject on output violations instead of redacting
        #[arg(long)]
        hard: bool,
    },

    /// Evaluate one piece of text against a policy and print the verdict
    Check {
        /// Which policy to evaluate against
        #[arg(long, value_enum, default_value = "input")]
        policy: PolicySide,

        /// Override the configured policy oracle backend
        #[arg(long, value_enum)]
        oracle: Option<OracleKind>,

        /// The text to judge
        text: String,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum PolicySide {
    Input,
    Output,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dirguard={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        DirguardConfig::load(config_path)?
    } else {
        DirguardConfig::default()
    };

    match cli.command {
        Commands::Chat {
            profile,
            oracle,
            hard,
        } => {
            run_chat(config, profile, oracle, hard).await?;
        }
        Commands::Check {
            policy,
            oracle,
            text,
        } => {
            run_check(config, policy, oracle, &text).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

/// Build the chat completion client for the configured endpoint
fn build_chat_client(config: &DirguardConfig) -> Result<Arc<dyn ChatClient>> {
    let api_key = config.resolve_api_key()?;
    let client = OpenAiChatClient::new(api_key, config.llm.model.clone())
        .with_base_url(&config.llm.base_url)
        .with_temperature(config.llm.temperature)
        .with_timeout(Duration::from_secs(config.llm.timeout_secs))
        .with_retry_config(config.llm.retry.clone());
    Ok(Arc::new(client))
}

/// Build the policy oracle for the selected backend
fn build_oracle(
    config: &DirguardConfig,
    kind: OracleKind,
    chat: &Arc<dyn ChatClient>,
) -> Result<Arc<dyn PolicyOracle>> {
    match kind {
        OracleKind::Llm => Ok(Arc::new(
            LlmPolicyOracle::new(chat.clone())
                .with_timeout(Duration::from_secs(config.llm.timeout_secs))
                .with_reason_cap(config.guard.reason_max_chars),
        )),
        OracleKind::Pattern => Ok(Arc::new(PatternOracle::new()?)),
    }
}

/// Build the redactor matching the selected oracle backend
fn build_redactor(
    config: &DirguardConfig,
    kind: OracleKind,
    chat: &Arc<dyn ChatClient>,
) -> Result<Arc<dyn Redactor>> {
    match kind {
        OracleKind::Llm => Ok(Arc::new(
            LlmRedactor::new(chat.clone(), config.guard.allowed_fields.clone())
                .with_timeout(Duration::from_secs(config.llm.timeout_secs)),
        )),
        OracleKind::Pattern => Ok(Arc::new(PatternRedactor::new(&config.guard.allowed_fields)?)),
    }
}

async fn run_chat(
    config: DirguardConfig,
    profile: Option<PathBuf>,
    oracle_override: Option<OracleKind>,
    hard: bool,
) -> Result<()> {
    let profile_path = profile
        .or_else(|| config.assistant.profile_path.clone())
        .ok_or_else(|| {
            dirguard::Error::Config(
                "no profile document: pass --profile or set assistant.profile_path".into(),
            )
        })?;
    let profile_text = std::fs::read_to_string(&profile_path)?;

    let oracle_kind = oracle_override.unwrap_or(config.guard.oracle);
    let soft_response = if hard { false } else { config.guard.soft_response };

    tracing::info!(
        oracle = ?oracle_kind,
        soft_response,
        profile = %profile_path.display(),
        "starting guarded chat"
    );

    let chat = build_chat_client(&config)?;
    let oracle = build_oracle(&config, oracle_kind, &chat)?;
    let redactor = build_redactor(&config, oracle_kind, &chat)?;

    let input_guard = InputGuard::new(oracle.clone(), config.input_policy());
    let output_guard = OutputGuard::new(oracle, config.output_policy());
    let history = History::seeded(&config.assistant.system_prompt, &profile_text);

    let session = ConversationSession::new(chat, input_guard, output_guard, redactor, history)
        .with_soft_response(soft_response)
        .with_revalidation(config.guard.revalidate_redactions);

    Console::new(session).run().await?;

    Ok(())
}

async fn run_check(
    config: DirguardConfig,
    side: PolicySide,
    oracle_override: Option<OracleKind>,
    text: &str,
) -> Result<()> {
    let oracle_kind = oracle_override.unwrap_or(config.guard.oracle);

    // The pattern backend needs no endpoint; only build a live client when
    // the generative oracle is selected.
    let oracle: Arc<dyn PolicyOracle> = match oracle_kind {
        OracleKind::Pattern => Arc::new(PatternOracle::new()?),
        OracleKind::Llm => {
            let chat = build_chat_client(&config)?;
            build_oracle(&config, OracleKind::Llm, &chat)?
        }
    };

    let policy: Policy = match side {
        PolicySide::Input => config.input_policy(),
        PolicySide::Output => config.output_policy(),
    };

    let verdict = oracle.evaluate(&policy, text).await?;
    println!("policy:  {}", policy.name.as_str());
    println!("allowed: {}", verdict.is_allowed());
    println!("reason:  {}", verdict.reason());

    Ok(())
}

fn show_config(config: Option<&DirguardConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)
        .map_err(|e| dirguard::Error::Config(format!("failed to render config: {}", e)))?;
    println!("{}", toml);
    Ok(())
}
