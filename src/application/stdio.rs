use crate::application::app::{McpAgentApp, StreamEvent};
use futures::StreamExt;
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

const EXIT_COMMANDS: &[&str] = &["exit", "quit"];

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for the interactive loop.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub streaming: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self { streaming: true }
    }
}

/// Chat over the process stdin/stdout until `exit`, `quit` or end of input.
pub async fn run(app: &mut McpAgentApp, options: ChatOptions) -> Result<(), StdioError> {
    let stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    chat_loop(app, stdin, &mut stdout, options).await
}

pub async fn chat_loop<R, W>(
    app: &mut McpAgentApp,
    reader: R,
    writer: &mut W,
    options: ChatOptions,
) -> Result<(), StdioError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    writer
        .write_all(b"Type your question, or 'exit' to quit.\n")
        .await?;

    loop {
        writer.write_all(b"\nYou: ").await?;
        writer.flush().await?;
        let Some(line) = lines.next_line().await? else {
            debug!("Input closed");
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&query.to_lowercase().as_str()) {
            info!("Chat session ended by user");
            break;
        }

        writer.write_all(b"Assistant: ").await?;
        if options.streaming {
            answer_streaming(app, query, writer).await?;
        } else {
            answer_buffered(app, query, writer).await?;
        }
        writer.flush().await?;
    }

    writer.write_all(b"Goodbye.\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Answer a single prompt and print the result.
pub async fn answer_once<W>(
    app: &mut McpAgentApp,
    query: &str,
    writer: &mut W,
    options: ChatOptions,
) -> Result<(), StdioError>
where
    W: AsyncWrite + Unpin,
{
    if options.streaming {
        answer_streaming(app, query, writer).await?;
    } else {
        answer_buffered(app, query, writer).await?;
    }
    writer.flush().await?;
    Ok(())
}

async fn answer_buffered<W>(app: &mut McpAgentApp, query: &str, writer: &mut W) -> Result<(), StdioError>
where
    W: AsyncWrite + Unpin,
{
    match app.run_query(query).await {
        Ok(result) => {
            writer.write_all(result.answer.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            write_trace(writer, result.trace_id.as_deref()).await?;
        }
        Err(err) => {
            error!(%err, "Query failed");
            write_error(writer, &err.user_message()).await?;
            write_trace(writer, err.trace_id()).await?;
        }
    }
    Ok(())
}

async fn answer_streaming<W>(app: &mut McpAgentApp, query: &str, writer: &mut W) -> Result<(), StdioError>
where
    W: AsyncWrite + Unpin,
{
    let mut events = app.run_query_stream(query);
    while let Some(event) = events.next().await {
        match event {
            Ok(StreamEvent::Chunk(text)) => {
                writer.write_all(text.as_bytes()).await?;
                writer.flush().await?;
            }
            Ok(StreamEvent::ToolStarted { name }) => {
                writer
                    .write_all(format!("\n[Calling tool: {name}]\n").as_bytes())
                    .await?;
            }
            Ok(StreamEvent::ToolFinished { success, .. }) => {
                let marker: &[u8] = if success {
                    b"[Tool completed]\n"
                } else {
                    b"[Tool failed]\n"
                };
                writer.write_all(marker).await?;
            }
            Ok(StreamEvent::Completed { trace_id }) => {
                writer.write_all(b"\n").await?;
                write_trace(writer, trace_id.as_deref()).await?;
            }
            Err(err) => {
                error!(%err, "Streamed query failed");
                writer.write_all(b"\n").await?;
                write_error(writer, &err.user_message()).await?;
                write_trace(writer, err.trace_id()).await?;
            }
        }
    }
    Ok(())
}

async fn write_error<W>(writer: &mut W, message: &str) -> Result<(), StdioError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("Error: {message}\n").as_bytes())
        .await?;
    Ok(())
}

async fn write_trace<W>(writer: &mut W, trace_id: Option<&str>) -> Result<(), StdioError>
where
    W: AsyncWrite + Unpin,
{
    if let Some(trace_id) = trace_id {
        writer
            .write_all(format!("Trace: {trace_id}\n").as_bytes())
            .await?;
    }
    Ok(())
}
