//! The `ndtools` command.
//!
//! `ndtools` (or `ndtools serve`) runs the MCP server on stdin/stdout. The
//! other commands inspect the catalog without starting a session.

use std::io::Write;

use logwise::privacy::LogIt;
use serde_json::json;

use ndtools::codec;
use ndtools::config::{Command, Config, ENV_CONTENT_DIR, ENV_MAX_FRAME_BYTES, ENV_SERVER_NAME, Launch};
use ndtools::mcp::dispatch::{InvocationRequest, Status};
use ndtools::server::{self, EXIT_CLEAN, EXIT_FORCED, EXIT_STARTUP, Server, StartupError};
use ndtools::wire::stdio::ThreadedInbox;

fn main() {
    let args = std::env::args().skip(1);
    let launch = match Launch::parse(args, |key| std::env::var(key).ok()) {
        Ok(launch) => launch,
        Err(e) => {
            eprintln!("ndtools: {e}");
            eprintln!("Help: ndtools help");
            std::process::exit(EXIT_STARTUP);
        }
    };
    let code = match launch.command {
        Command::Help => {
            help();
            EXIT_CLEAN
        }
        Command::Serve => serve(&launch.config),
        Command::List => report(list(&launch.config)),
        Command::Call { tool, arguments } => report(call(&launch.config, tool, arguments)),
    };
    std::process::exit(code);
}

fn serve(config: &Config) -> i32 {
    ndtools::signal::install();
    let service = match server::assemble(config) {
        Ok(service) => service,
        Err(e) => return startup_failed(e),
    };
    let mut inbox = match ThreadedInbox::stdin(config.max_frame_bytes) {
        Ok(inbox) => inbox,
        Err(e) => return startup_failed(e.into()),
    };
    logwise::info_sync!(
        "serving on stdio, frame limit {limit} bytes",
        limit = LogIt(&config.max_frame_bytes)
    );
    let stdout = std::io::stdout().lock();
    match Server::new(service).serve(&mut inbox, stdout) {
        Ok(shutdown) => shutdown.exit_code(),
        Err(e) => e.exit_code(),
    }
}

fn startup_failed(error: StartupError) -> i32 {
    logwise::error_sync!("startup failed: {e}", e = LogIt(&error.to_string()));
    eprintln!("ndtools: {error}");
    error.exit_code()
}

/// Prints the tool catalog as JSON.
fn list(config: &Config) -> Result<i32, StartupError> {
    let service = server::assemble(config)?;
    match serde_json::to_string_pretty(&service.tools().list()) {
        Ok(listing) => {
            println!("{listing}");
            Ok(EXIT_CLEAN)
        }
        Err(e) => {
            eprintln!("ndtools: {e}");
            Ok(EXIT_FORCED)
        }
    }
}

/// Runs one invocation in-process and prints the encoded response.
fn call(
    config: &Config,
    tool: String,
    arguments: serde_json::Map<String, serde_json::Value>,
) -> Result<i32, StartupError> {
    let service = server::assemble(config)?;
    let result = service
        .dispatcher()
        .dispatch(InvocationRequest::new(json!(1), tool, arguments));
    let status = result.status();
    let response = codec::result_response(result);
    let mut stdout = std::io::stdout().lock();
    let written = codec::encode_response(&response)
        .map_err(std::io::Error::other)
        .and_then(|body| {
            stdout.write_all(&body)?;
            stdout.write_all(b"\n")
        });
    if let Err(e) = written {
        eprintln!("ndtools: {e}");
        return Ok(EXIT_FORCED);
    }
    Ok(match status {
        Status::Success => EXIT_CLEAN,
        Status::Failure => EXIT_FORCED,
    })
}

fn report(outcome: Result<i32, StartupError>) -> i32 {
    outcome.unwrap_or_else(startup_failed)
}

fn help() {
    eprintln!("A stdio MCP server for Nexus Dashboard developer reference content");
    eprintln!();
    eprintln!("Usage: ndtools [COMMAND] [OPTIONS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  serve                    Serve MCP on stdin/stdout (default)");
    eprintln!("  list                     Print the tool catalog as JSON");
    eprintln!("  call <tool> [json-args]  Run one tool and print the response");
    eprintln!("  help                     Show this message");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --content-dir <path>     Files here override the built-in content [{ENV_CONTENT_DIR}]");
    eprintln!("  --max-frame-bytes <n>    Largest accepted message [{ENV_MAX_FRAME_BYTES}]");
    eprintln!("  --server-name <name>     Name reported to clients [{ENV_SERVER_NAME}]");
}
