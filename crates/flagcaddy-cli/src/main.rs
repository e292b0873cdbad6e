mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// flagcaddy -- a low-noise recon assistant that watches your shell.
#[derive(Parser, Debug)]
#[command(name = "flagcaddy", version, about)]
struct Cli {
    /// Config file to use instead of ~/.flagcaddy/config.toml
    #[arg(long, global = true, env = "FLAGCADDY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a shell (or any command) under capture
    Wrap {
        /// Session name; reusing a name appends to that session
        #[arg(long, short)]
        session: Option<String>,

        /// Command and arguments to run (defaults to your shell)
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// List recorded sessions
    Sessions,

    /// Show captured events of a session
    Events {
        /// Session name
        #[arg(long, short)]
        session: String,

        /// Number of most recent events to display
        #[arg(long, default_value_t = 20)]
        last: usize,
    },

    /// Show facts learned in a session
    Facts {
        /// Session name
        #[arg(long, short)]
        session: String,

        /// Only facts of this type (host, service, credential, flag, ...)
        #[arg(long = "type")]
        kind: Option<String>,
    },

    /// Show recommendations, newest first
    Recs {
        /// Only recommendations of this session
        #[arg(long, short)]
        session: Option<String>,

        /// Number of recommendations to display
        #[arg(long, default_value_t = 20)]
        last: usize,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loader = commands::loader(cli.config);

    // wrap owns the terminal in raw mode and logs to a file instead
    if !matches!(cli.command, Commands::Wrap { .. }) {
        commands::init_stderr_logging();
    }

    match cli.command {
        Commands::Wrap { session, command } => {
            let code = commands::wrap::run(&loader, session.as_deref(), &command)?;
            std::process::exit(code);
        }
        Commands::Sessions => commands::sessions::run(&loader),
        Commands::Events { session, last } => commands::events::run(&loader, &session, last),
        Commands::Facts { session, kind } => {
            commands::facts::run(&loader, &session, kind.as_deref())
        }
        Commands::Recs { session, last } => {
            commands::recs::run(&loader, session.as_deref(), last)
        }
        Commands::Init { force } => commands::init::run(&loader, force),
        Commands::Config => commands::config::show(&loader),
    }
}
