//! vroute command - validate, encode and apply VRRP route sets.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{Context, Feature};

#[derive(Parser)]
#[command(name = "vroute", version, about = "Virtual route synchronization tool")]
struct Cli {
    /// Directory holding the iproute2 name tables.
    #[arg(long, global = true, default_value = "/etc/iproute2")]
    iproute2_dir: PathBuf,

    /// Network namespace to operate in (name or path).
    #[arg(long, global = true)]
    netns: Option<String>,

    /// Reject clauses the running kernel does not support.
    #[arg(long, global = true, value_enum, value_delimiter = ',')]
    disable: Vec<Feature>,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a route file and print the routes it describes.
    Check(commands::check::CheckCmd),

    /// Show the netlink requests for a route file without sending them.
    Encode(commands::encode::EncodeCmd),

    /// Install the routes of a route file.
    Apply(commands::apply::ApplyCmd),

    /// Remove the routes of a route file.
    Withdraw(commands::apply::WithdrawCmd),

    /// Move the kernel from one route file to another.
    Reload(commands::apply::ReloadCmd),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::default().add_directive(level.into())),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new(&cli.iproute2_dir, cli.netns, &cli.disable);

    let result = match cli.command {
        Command::Check(cmd) => cmd.run(&ctx),
        Command::Encode(cmd) => cmd.run(&ctx),
        Command::Apply(cmd) => cmd.run(&ctx).await,
        Command::Withdraw(cmd) => cmd.run(&ctx).await,
        Command::Reload(cmd) => cmd.run(&ctx).await,
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
