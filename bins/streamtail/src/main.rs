mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands, Effective, Schema, Target};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let eff = match cli.command {
        Commands::Events(args) => Effective::from_args(Schema::Event, &args.tail, Target::device(args.dev_eui.as_deref())),
        Commands::Frames(args) => Effective::from_args(Schema::Frame, &args.tail, args.target()),
        Commands::Meta(args) => Effective::from_args(Schema::Meta, &args, Target::default()),
        Commands::Requests(args) => Effective::from_args(Schema::Request, &args, Target::default()),
        Commands::Run(args) => Effective::from_file(&args),
    };

    let result = match eff {
        Ok(eff) => cmd::tail::run(eff).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
