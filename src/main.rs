use clap::Parser;
use databricks_mcp_agent::Cli;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    databricks_mcp_agent::run(cli).await
}
