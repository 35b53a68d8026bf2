mod config;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ytx_agent::{describe_timeout, LlmProvider, RequestDispatcher};
use ytx_channels::{
    AnalyzeArgs, ChatArgs, Command, GenerateArgs, MessageBridge, MpscSink, PanelConsumer,
    PanelEvent, PanelOutcome, PanelRequestContext, PanelRouter,
};
use ytx_core::{ChatMessage, Transcript};

use crate::config::YtxConfig;

#[derive(Parser)]
#[command(name = "ytx", about = "ytx: summaries, study aids, and chat over video transcripts")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ytx.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Vendor {
    /// Provider to use (overrides config)
    #[arg(short, long)]
    provider: Option<LlmProvider>,
    /// Model to request (overrides config)
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a transcript
    Summarize {
        /// Transcript file in `[m:ss] text` lines, or `-` for stdin
        #[arg(short, long)]
        transcript: PathBuf,
        /// Custom prompt template with a `{transcript}` placeholder
        #[arg(long)]
        prompt: Option<PathBuf>,
        #[command(flatten)]
        vendor: Vendor,
    },
    /// Generate a study aid from a transcript
    Generate {
        #[arg(value_enum)]
        feature: Feature,
        /// Transcript file in `[m:ss] text` lines, or `-` for stdin
        #[arg(short, long)]
        transcript: PathBuf,
        /// Custom prompt template with a `{transcript}` placeholder
        #[arg(long)]
        prompt: Option<PathBuf>,
        #[command(flatten)]
        vendor: Vendor,
    },
    /// Ask a question about a transcript
    Chat {
        #[arg(short, long)]
        transcript: PathBuf,
        #[arg(short, long)]
        question: String,
        /// Earlier turns as a JSON array of `{role, content}`
        #[arg(long)]
        history: Option<PathBuf>,
        #[command(flatten)]
        vendor: Vendor,
    },
    /// Analyze a whole video with Gemini when no transcript exists
    Analyze {
        /// Video URL
        #[arg(short, long)]
        url: String,
        /// File holding the analysis instructions
        #[arg(long)]
        prompt: Option<PathBuf>,
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Feature {
    Html,
    Cards,
    Mindmap,
    Vocab,
}

/// Streams prose to stdout as it arrives and keeps the panel state.
struct TerminalPanel {
    context: Mutex<PanelRequestContext>,
    echo: bool,
}

impl PanelConsumer for TerminalPanel {
    fn on_event(&self, event: PanelEvent) {
        if let (true, PanelEvent::Chunk(text)) = (self.echo, &event) {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
        self.context.lock().apply(event);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = YtxConfig::load_or_default(&cli.config)?;
    let command = build_command(cli.command, &config)?;

    let dispatcher = RequestDispatcher::new(config.dispatcher_config());
    info!(
        timeout = %describe_timeout(dispatcher.config().request_timeout),
        "dispatcher ready"
    );

    let (sink, mut inbox) = MpscSink::channel("terminal");
    let bridge = MessageBridge::new(dispatcher, Arc::new(sink)).with_limits(config.limits());

    let panel = Arc::new(TerminalPanel {
        context: Mutex::new(PanelRequestContext::for_command(&command)),
        echo: command.structured_kind().is_none(),
    });
    let router = PanelRouter::new();
    router.register(command.channel(), panel.clone());

    let handle = bridge.submit(command);
    // The inbox closes once the relay task and the bridge release the sink.
    drop(bridge);
    while let Some(raw) = inbox.recv().await {
        router.route_json(&raw);
    }
    handle.await?;

    let context = panel.context.lock();
    if let Some((provider, model)) = context.model() {
        info!(
            provider,
            model,
            elapsed_ms = context.elapsed().map(|d| d.num_milliseconds()),
            "request finished"
        );
    }
    match context.outcome() {
        PanelOutcome::Text(_) => println!(),
        PanelOutcome::Structured(payload) => {
            println!("{}", serde_json::to_string_pretty(payload)?);
        }
        PanelOutcome::Failed(message) => anyhow::bail!("{message}"),
        PanelOutcome::Pending => anyhow::bail!("the response ended without a result"),
    }

    Ok(())
}

fn build_command(command: Commands, config: &YtxConfig) -> anyhow::Result<Command> {
    let command = match command {
        Commands::Summarize {
            transcript,
            prompt,
            vendor,
        } => Command::Summarize(GenerateArgs {
            content: read_transcript(&transcript)?,
            prompt_template: read_optional(prompt.as_deref())?,
            settings: config.settings(vendor.provider, vendor.model),
        }),
        Commands::Generate {
            feature,
            transcript,
            prompt,
            vendor,
        } => {
            let args = GenerateArgs {
                content: read_transcript(&transcript)?,
                prompt_template: read_optional(prompt.as_deref())?,
                settings: config.settings(vendor.provider, vendor.model),
            };
            match feature {
                Feature::Html => Command::GenerateHtml(args),
                Feature::Cards => Command::GenerateCards(args),
                Feature::Mindmap => Command::GenerateMindmap(args),
                Feature::Vocab => Command::GenerateVocab(args),
            }
        }
        Commands::Chat {
            transcript,
            question,
            history,
            vendor,
        } => {
            let mut messages: Vec<ChatMessage> = match read_optional(history.as_deref())? {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Vec::new(),
            };
            messages.push(ChatMessage::user(question));
            Command::ChatAsk(ChatArgs {
                transcript: read_transcript(&transcript)?,
                messages,
                settings: config.settings(vendor.provider, vendor.model),
            })
        }
        Commands::Analyze { url, prompt, model } => Command::AnalyzeMedia(AnalyzeArgs {
            media_url: url,
            prompt: read_optional(prompt.as_deref())?,
            api_key: config.api_key(LlmProvider::Gemini),
            model: model.or_else(|| config.model(LlmProvider::Gemini)),
        }),
    };
    Ok(command)
}

/// Reads a transcript and normalizes it to `[m:ss] text` lines.
fn read_transcript(path: &Path) -> anyhow::Result<String> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read transcript '{}': {}", path.display(), e))?
    };
    let transcript = Transcript::from_lines(&raw);
    if transcript.is_empty() {
        anyhow::bail!("transcript '{}' is empty", path.display());
    }
    Ok(transcript.full())
}

fn read_optional(path: Option<&Path>) -> anyhow::Result<Option<String>> {
    path.map(|p| {
        std::fs::read_to_string(p)
            .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", p.display(), e))
    })
    .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn transcript_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_transcript_is_normalized() {
        let file = transcript_file("[0:05] hello\n\ncontinued\n[1:02:03] late\n");
        let content = read_transcript(file.path()).unwrap();
        assert_eq!(content, "[0:05] hello\n[0:05] continued\n[62:03] late");
    }

    #[test]
    fn test_empty_transcript_rejected() {
        let file = transcript_file("\n  \n");
        assert!(read_transcript(file.path()).is_err());
    }

    #[test]
    fn test_generate_maps_feature_to_command() {
        let file = transcript_file("[0:01] hi");
        let command = build_command(
            Commands::Generate {
                feature: Feature::Mindmap,
                transcript: file.path().to_path_buf(),
                prompt: None,
                vendor: Vendor {
                    provider: Some(LlmProvider::Claude),
                    model: None,
                },
            },
            &YtxConfig::default(),
        )
        .unwrap();
        assert_eq!(command.channel(), "MINDMAP");
        match command {
            Command::GenerateMindmap(args) => {
                assert_eq!(args.settings.provider, LlmProvider::Claude);
                assert_eq!(args.content, "[0:01] hi");
            }
            other => panic!("Expected GenerateMindmap, got {other:?}"),
        }
    }

    #[test]
    fn test_chat_appends_question_to_history() {
        let transcript = transcript_file("[0:01] hi");
        let history = transcript_file(r#"[{"role":"user","content":"a"},{"role":"assistant","content":"b"}]"#);
        let command = build_command(
            Commands::Chat {
                transcript: transcript.path().to_path_buf(),
                question: "why?".into(),
                history: Some(history.path().to_path_buf()),
                vendor: Vendor {
                    provider: None,
                    model: None,
                },
            },
            &YtxConfig::default(),
        )
        .unwrap();
        match command {
            Command::ChatAsk(args) => {
                assert_eq!(args.messages.len(), 3);
                assert_eq!(args.messages[2], ChatMessage::user("why?"));
            }
            other => panic!("Expected ChatAsk, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "ytx", "generate", "cards", "--transcript", "t.txt", "-p", "openai",
        ]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Generate {
                feature: Feature::Cards,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["ytx", "generate", "poster", "-t", "t.txt"]).is_err());
    }
}
