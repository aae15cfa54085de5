//! blocks-host - render the demo block app from a JSON request

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use libblocks::logging::LoggingConfig;
use libblocks::{BlocksError, Config, LocalHost, RenderRequest, RenderResponse, RenderState};
use tracing::debug;

mod demo;

#[derive(Parser, Debug)]
#[command(name = "blocks-host")]
#[command(version, about = "Render the demo block app from a JSON request")]
#[command(long_about = r#"Render the demo block app from a JSON render request.

The request is read from --request or stdin. Empty input is treated as an
initial request with fresh state. Pending async work is settled and the
request redelivered before answering, up to renderer.max_resume_cycles times.
Hooks left loading by an earlier run are started again. The JSON response
goes to stdout, logs go to stderr.

EXAMPLES:
    # Initial render
    blocks-host < /dev/null

    # Press the counter button, feeding back the previous render state
    blocks-host < /dev/null | jq '{kind: "user_action", action_id: "incr", prior_render_state: .render_state}' | blocks-host

    # Pretty-print the initial render
    blocks-host --pretty < /dev/null

EXIT CODES:
    0 - Success
    1 - Render or callback failure, I/O error
    2 - Configuration error
    3 - Protocol error or malformed request
"#)]
struct Cli {
    /// Read the request from this file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    request: Option<PathBuf>,

    /// Configuration file (defaults to $BLOCKS_CONFIG or ~/.config/blocks/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

/// Render one request; returns the exit code for the response
async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_or_default()?,
    };
    LoggingConfig::from_settings(&config.logging, cli.verbose).init();
    debug!("blocks-host started with args: {:?}", cli);

    let request = read_request(cli.request.as_ref())?;
    let reconciler = demo::app(config.renderer.clone());

    // Pending futures live in this process only, so settle them before answering
    let mut host = LocalHost::new(reconciler)?.with_state(request.prior_render_state.clone());
    let response = host.process(request).await;

    print_response(&response, cli.pretty)?;
    Ok(response
        .failure
        .as_ref()
        .map(|failure| failure.kind.exit_code())
        .unwrap_or(0))
}

fn read_request(path: Option<&PathBuf>) -> Result<RenderRequest> {
    let input = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(BlocksError::from)
            .with_context(|| format!("Failed to read request from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(BlocksError::from)
                .context("Failed to read request from stdin")?;
            buffer
        }
    };

    if input.trim().is_empty() {
        return Ok(RenderRequest::initial(RenderState::new()));
    }
    Ok(RenderRequest::from_json(&input)?)
}

fn print_response(response: &RenderResponse, pretty: bool) -> Result<()> {
    let json = if pretty {
        response.to_json_pretty()?
    } else {
        response.to_json()?
    };
    println!("{}", json);
    Ok(())
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<BlocksError>())
        .map(BlocksError::exit_code)
        .unwrap_or(1)
}
