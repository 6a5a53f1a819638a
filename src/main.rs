use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shellpm::app::App;
use shellpm::command::PluginCommand;
use shellpm::model::config::{self, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "shellpm", version, about = "Install, update and remove shell plugins")]
struct Cli {
    /// Config file (defaults to the per-user config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding installed plugins
    #[arg(long)]
    plugin_root: Option<PathBuf>,
    /// Registry file listing available plugins
    #[arg(long)]
    registry: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registry entries whose name matches a `*` wildcard
    List { pattern: Option<String> },
    /// Clone plugins and bind their commands
    Install {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Pull the named plugins, or every installed plugin
    Update { names: Vec<String> },
    /// Delete installed plugins
    Remove {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Run a command provided by an installed plugin
    Run {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging to file (never stdout)
    let log_dir = config::data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "shellpm.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shellpm=info")),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::from(2));
    };

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.plugin_root {
        config.general.plugin_root = std::path::absolute(root)?;
    }
    if let Some(registry) = cli.registry {
        config.general.registry_path = std::path::absolute(registry)?;
    }

    tracing::info!("shellpm starting: {command:?}");
    let mut app = App::new(&config)?;
    for notice in app.startup_notifications() {
        eprintln!("warning: {notice}");
    }

    let plugin_command = match command {
        Command::List { pattern } => PluginCommand::List { pattern },
        Command::Install { names } => PluginCommand::Install { names },
        Command::Update { names } => PluginCommand::Update { names },
        Command::Remove { names } => PluginCommand::Remove { names },
        Command::Run { command, args } => {
            let output = app.run_plugin_command(&command, &args.join(" "))?;
            println!("{output}");
            return Ok(ExitCode::SUCCESS);
        }
    };

    let response = app.execute(plugin_command)?;
    for line in &response.lines {
        println!("{line}");
    }

    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
