use std::{fs, path::PathBuf, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Parser, Subcommand};
use coder_bridge::{
    app::AppContext,
    commands::HostCommand,
    config::{settings_path, Settings},
    console::{ConsoleHost, HELP},
    diff::PreviewFilePresenter,
    dictation::RecordingResponse,
    launcher::{parse_bot_action, BotLauncher},
    Bridge, Result,
};

#[derive(Parser)]
#[command(name = "coder-bridge")]
#[command(about = "Editor-side bridge to the Coder CLI")]
struct Cli {
    /// Port the Coder CLI listens on
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Workspace folder (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge with commands read from stdin
    Run {
        #[arg(long)]
        no_auto_connect: bool,
        #[arg(long)]
        no_diff_preview: bool,
    },
    /// Launch the Coder CLI in a terminal, then run the bridge
    StartCli {
        /// Lite mode, as in the side-by-side terminal
        #[arg(long)]
        split: bool,
    },
    /// Run an OpenClaw bot action (wake-up, console, start, stop, restart)
    Bot { action: String },
    /// Record from the microphone
    Record {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        /// Write the audio here instead of printing it as base64
        #[arg(long)]
        output: Option<PathBuf>,
        /// Transcribe the recording
        #[arg(long)]
        transcribe: bool,
    },
    /// Print the resolved settings and coder.config.json
    Config,
    /// Sign out of the configured account
    Logout,
}

fn init_tracing() -> Result<()> {
    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("coder-bridge");
    fs::create_dir_all(&dir)?;
    let log_file = fs::File::create(dir.join("coder-bridge.log"))?;

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "coder_bridge=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Logging disabled: {e}");
    }

    let workspace = cli
        .workspace
        .clone()
        .or_else(|| std::env::current_dir().ok());
    let mut settings = Settings::load(&settings_path());
    if let Some(port) = cli.port {
        settings.server_port = port;
    }

    let result = match cli.command {
        Commands::Run {
            no_auto_connect,
            no_diff_preview,
        } => {
            settings.auto_connect &= !no_auto_connect;
            settings.show_diff_preview &= !no_diff_preview;
            run_bridge(settings, workspace, None).await
        }
        Commands::StartCli { split } => {
            let first = if split {
                HostCommand::OpenSplitTerminal
            } else {
                HostCommand::StartCli
            };
            settings.auto_connect = false;
            run_bridge(settings, workspace, Some(first)).await
        }
        Commands::Bot { action } => run_bot(workspace, &action).await,
        Commands::Record {
            seconds,
            output,
            transcribe,
        } => {
            let mut ctx = AppContext::load(settings, workspace.as_slice());
            record(&mut ctx, Duration::from_secs(seconds), output, transcribe).await
        }
        Commands::Config => print_config(settings, workspace.as_slice()),
        Commands::Logout => AppContext::load(settings, workspace.as_slice()).logout(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_bridge(
    settings: Settings,
    workspace: Option<PathBuf>,
    first: Option<HostCommand>,
) -> Result<()> {
    let host = ConsoleHost::new(workspace);
    let commands = host.spawn_stdin();
    let mut bridge = Bridge::new(host, PreviewFilePresenter::default(), settings);
    bridge.activate();
    println!("{HELP}");
    if let Some(command) = first {
        bridge.execute(command).await;
    }

    let finished = tokio::select! {
        result = bridge.run(commands) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    finished.unwrap_or_else(|| {
        bridge.shutdown();
        Ok(())
    })
}

async fn run_bot(workspace: Option<PathBuf>, action: &str) -> Result<()> {
    let action = parse_bot_action(action)?;
    let host = ConsoleHost::new(workspace);
    let mut bot = BotLauncher::default();
    bot.run(&host, action)?;
    host.wait_terminals().await;
    bot.dispose(&host);
    Ok(())
}

async fn record(
    ctx: &mut AppContext,
    duration: Duration,
    output: Option<PathBuf>,
    transcribe: bool,
) -> Result<()> {
    ctx.recorder.start_recording().await?;
    println!("Recording for {}s, Ctrl-C to cancel", duration.as_secs());

    let interrupted = tokio::select! {
        () = tokio::time::sleep(duration) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        let response: RecordingResponse = ctx.recorder.cancel_recording().await.into();
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    let audio = ctx.recorder.stop_recording().await?;
    if transcribe {
        println!("{}", ctx.transcribe(&audio, None)?);
    }
    match output {
        Some(path) => {
            let bytes = STANDARD
                .decode(&audio)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            fs::write(&path, bytes)?;
            println!("Saved recording to {}", path.display());
        }
        None => {
            let response: RecordingResponse = Ok::<_, coder_bridge::Error>(audio).into();
            println!("{}", serde_json::to_string(&response)?);
        }
    }
    Ok(())
}

fn print_config(settings: Settings, workspace: &[PathBuf]) -> Result<()> {
    println!("settings ({}):", settings_path().display());
    println!("{}", serde_json::to_string_pretty(&settings)?);

    let ctx = AppContext::load(settings, workspace);
    match &ctx.coder_config {
        Some(config) => {
            println!("coder.config.json:");
            println!("{}", serde_json::to_string_pretty(config)?);
            if let Some(selection) = config.provider_selection() {
                println!("provider:");
                println!("{}", serde_json::to_string_pretty(&selection)?);
            }
        }
        None => println!("coder.config.json: not found"),
    }
    println!("account: {}", if ctx.account.is_some() { "configured" } else { "none" });
    Ok(())
}
