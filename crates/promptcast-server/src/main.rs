//! PromptCast: broadcast one prompt to every open AI chat tab.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use promptcast_browser::InjectionRequest;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("PROMPTCAST_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

/// Split `send` arguments into the new-conversation flag and the text.
fn parse_send_args(args: &[String]) -> (bool, String) {
    let mut start_new = false;
    let mut words = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--new" | "-n" if words.is_empty() => start_new = true,
            _ => words.push(arg.as_str()),
        }
    }
    (start_new, words.join(" "))
}

fn print_usage() {
    println!("PromptCast: broadcast a prompt to open Gemini, ChatGPT and Claude tabs");
    println!();
    println!("Usage: promptcast [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve           Start the HTTP API");
    println!("  send [--new] <text...>   Send text to every open target tab");
    println!("  targets                  List targets and whether a tab is open");
    println!("  help                     Show this help message");
    println!();
    println!("Environment:");
    println!("  PORT                     HTTP port (default 3017)");
    println!("  PROMPTCAST_DEVTOOLS_URL  Browser remote debugging endpoint");
    println!("  PROMPTCAST_DATA_DIR      Data directory (default data/)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `send` and `targets` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    if matches!(command, "--help" | "-h" | "help") {
        print_usage();
        return Ok(());
    }
    if !matches!(command, "serve" | "send" | "targets") {
        eprintln!("Unknown command: {}. Use 'promptcast help' for usage.", command);
        std::process::exit(1);
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = promptcast_core::PromptcastConfig::from_env(&data_dir)?;
    let port = config.port;
    let state = Arc::new(AppState::new(config)?);

    match command {
        "send" => {
            let (start_new, text) = parse_send_args(&args[2..]);
            let request = match InjectionRequest::new(text, start_new) {
                Ok(request) => request,
                Err(e) => {
                    eprintln!("{}. Usage: promptcast send [--new] <text...>", e);
                    std::process::exit(1);
                }
            };
            let reports = state.broadcaster.send(request).await;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        "targets" => {
            let targets = state.broadcaster.list_targets().await;
            println!("{}", serde_json::to_string_pretty(&targets)?);
        }
        _ => {
            let app = routes::build_router(state.clone());
            let addr = format!("127.0.0.1:{}", port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("PromptCast server listening on {}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
