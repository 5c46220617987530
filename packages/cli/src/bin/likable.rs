use clap::{Parser, Subcommand};
use colored::*;
use likable_cli::{run_server, Config};
use likable_preview::{
    find_target, is_port_available, probe_connect, PreviewConfig, PreviewSupervisor,
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "likable")]
#[command(about = "Likable - build and preview Gradio apps from a prompt")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the host server with the embedded preview (default)
    Serve {
        /// Host server port (overrides LIKABLE_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Host server address (overrides LIKABLE_HOST)
        #[arg(long)]
        host: Option<IpAddr>,
        /// Directory searched for the target script (overrides LIKABLE_SANDBOX_DIR)
        #[arg(long)]
        sandbox: Option<PathBuf>,
    },
    /// Manage the preview app
    #[command(subcommand)]
    Preview(PreviewCommands),
}

#[derive(Subcommand)]
enum PreviewCommands {
    /// Locate the target script and check that the preview port is free
    Check,
    /// Run the preview app in the foreground until Ctrl+C
    Run,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    likable_cli::init_tracing();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        port: None,
        host: None,
        sandbox: None,
    });

    if let Err(e) = handle_command(command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            port,
            host,
            sandbox,
        } => {
            let mut config = Config::from_env()?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }

            let mut preview_config = PreviewConfig::from_env();
            if let Some(sandbox) = sandbox {
                preview_config.sandbox_dir = sandbox;
            }
            config.check_preview_port(preview_config.port)?;
            run_server(config, PreviewSupervisor::new(preview_config)).await
        }
        Commands::Preview(PreviewCommands::Check) => check_preview().await,
        Commands::Preview(PreviewCommands::Run) => run_preview().await,
    }
}

async fn check_preview() -> anyhow::Result<()> {
    let config = PreviewConfig::from_env();

    let script = find_target(&config.sandbox_dir, &config.target_name)?;
    println!("{} Target: {}", "✓".green(), script.display());

    if is_port_available(&config.host, config.port) {
        println!("{} Port {} is free", "✓".green(), config.port);
    } else if probe_connect(&config.probe_host(), config.port, config.probe_timeout).await {
        println!(
            "{} Port {} is in use and answering; a preview may already be running",
            "!".yellow(),
            config.port
        );
    } else {
        println!(
            "{} Port {} is in use but not answering",
            "!".yellow(),
            config.port
        );
    }

    println!(
        "  Command: {} {} --server-port {} --server-name {}",
        config.interpreter, config.target_name, config.port, config.host
    );
    Ok(())
}

async fn run_preview() -> anyhow::Result<()> {
    let supervisor = PreviewSupervisor::from_env();

    let outcome = supervisor.ensure_running().await?;
    if !outcome.ok {
        anyhow::bail!("{}", outcome.message);
    }
    println!("{} {}", "✓".green(), outcome.message);
    println!("Press Ctrl+C to stop.");

    likable_cli::server::shutdown_signal().await;
    let termination = supervisor.stop().await;
    println!("Preview stopped ({})", termination.as_str());
    Ok(())
}
