use anyhow::Result;
use clap::Parser;

use context7_gateway::config::Settings;
use context7_gateway::server;

#[derive(Parser, Debug)]
#[command(version, about = "Context7 documentation gateway (HTTP API and MCP server)")]
struct Cli {
    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    server::run(cli.settings).await
}
