use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bobavim_lib::commands::config::{config_path, load_config, save_server_url};
use bobavim_lib::commands::logs::logs_dir;
use bobavim_lib::commands::play::{print_state, run_play};
use bobavim_lib::commands::script::run_script;

#[derive(Parser)]
#[command(name = "bobavim", version, about = "Play Boba.vim from the terminal")]
struct Cli {
    /// Game server base URL (overrides the config file).
    #[arg(long, global = true, env = "BOBAVIM_SERVER")]
    server: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive game in the terminal.
    Play {
        /// Bootstrap from the rendered game page instead of the state API.
        #[arg(long)]
        dom: bool,
        /// Don't poll the server for state changes.
        #[arg(long)]
        no_poll: bool,
    },
    /// Feed a key script (e.g. `3lgg<Esc>fx`) and print the final board.
    Keys {
        keys: String,
        #[arg(long)]
        dom: bool,
    },
    /// Print the server's current game state.
    State,
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    SetServer { url: String },
}

/// Interactive play owns the screen, so its logs go to a file.
fn init_tracing(interactive: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,bobavim_lib=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if !interactive {
        builder.with_writer(std::io::stderr).init();
        return;
    }

    let file = logs_dir().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("trace.log"))
            .ok()
    });
    match file {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init(),
        None => builder.with_writer(std::io::sink).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Play { .. }));

    let config = load_config();
    let server_url = cli
        .server
        .clone()
        .unwrap_or_else(|| config.server_url.clone());

    match cli.command {
        Commands::Play { dom, no_poll } => {
            run_play(&config, &server_url, dom, !no_poll)
                .await
                .with_context(|| format!("session against {server_url} failed"))?;
        }
        Commands::Keys { keys, dom } => {
            let board = run_script(&server_url, &keys, dom)
                .await
                .with_context(|| format!("running keys against {server_url}"))?;
            println!("{board}");
        }
        Commands::State => {
            let state = print_state(&server_url)
                .await
                .with_context(|| format!("fetching state from {server_url}"))?;
            println!("{state}");
        }
        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                if let Some(path) = config_path() {
                    eprintln!("({})", path.display());
                }
            }
            ConfigCommand::SetServer { url } => {
                let config = save_server_url(&url).context("saving config")?;
                println!("server set to {}", config.server_url);
            }
        },
    }

    Ok(())
}
