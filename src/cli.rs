use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    name = "databricks-mcp-agent",
    version,
    about = "Tool-calling agent over a Databricks serving endpoint and MCP servers"
)]
pub struct Cli {
    /// Answer a single prompt and exit instead of starting the chat loop
    #[arg(long, short)]
    pub prompt: Option<String>,
    /// Print whole answers instead of streaming them
    #[arg(long)]
    pub no_stream: bool,
    /// Override the system prompt
    #[arg(long)]
    pub system: Option<String>,
    /// Silence log output
    #[arg(long, short)]
    pub quiet: bool,
}
