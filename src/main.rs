use anyhow::Result;
use clap::Parser;
use pairs_analytics::cli::{self, Cli};
use pairs_analytics::{chart, live, report, tail};

#[tokio::main]
async fn main() -> Result<()> {
    let (store, command) = Cli::parse().command();
    match command {
        cli::Command::Run(args) => live::run(&store, args).await,
        cli::Command::Simulate(args) => live::simulate(&store, args).await,
        cli::Command::Stats(args) => report::stats(&store, args).await,
        cli::Command::Tail(args) => tail::run(&store, args).await,
        cli::Command::Chart(args) => chart::run(&store, args).await,
        cli::Command::Export(args) => report::export(&store, args).await,
    }
}
