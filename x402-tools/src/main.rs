use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;

use x402_tools::config::Config;
use x402_tools::mcp::McpServer;
use x402_tools::tools;
use x402_tools::x402::X402Signer;

const HELP: &str = r#"
x402-tools: paid 402box agents as MCP tools

USAGE:
    x402-tools [COMMAND]

COMMANDS:
    serve                  Run the MCP server on stdio (default)
    call <TOOL> <QUERY>    Run one tool and print its result
    tools                  Print the tool definitions as JSON
    address                Print the paying wallet address
    help                   Print this help
    version                Print the version

ENVIRONMENT:
    X402_PRIVATE_KEY       Wallet private key (fallback after the config file)
    X402_CONFIG_PATH       JSON config file (default: x402.config.json)
    X402_ENV_FILE          Env file searched for X402_PRIVATE_KEY (default: .env)
    X402_AGENTS_BASE_URL   Agent gateway (default: https://agents.402box.io)
    RUST_LOG               Log filter (default: info), logs go to stderr

EXAMPLES:
    x402-tools call x_searcher "what is trending in rust today"
    x402-tools call find_people "founders of 402box"
"#;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Arc::new(Config::from_env());
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve") => run_serve(config).await,
        Some("call") => run_call(config, &args[2..]).await,
        Some("tools") => run_tools(config),
        Some("address") => run_address(&config),
        Some("-h" | "--help" | "help") => {
            println!("{}", HELP);
            ExitCode::SUCCESS
        }
        Some("-V" | "--version" | "version") => {
            println!("x402-tools {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("{}", HELP);
            ExitCode::FAILURE
        }
    }
}

async fn run_serve(config: Arc<Config>) -> ExitCode {
    log::info!("Agent gateway: {}", config.base_url);
    let registry = Arc::new(tools::create_default_registry(config));
    log::info!("Registered {} tools", registry.len());

    let server = Arc::new(McpServer::new(registry));
    match server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
    {
        Ok(()) => {
            log::info!("MCP server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("MCP server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_call(config: Arc<Config>, args: &[String]) -> ExitCode {
    let (tool_name, query) = match args.split_first() {
        Some((tool, rest)) if !rest.is_empty() => (tool, rest.join(" ")),
        _ => {
            eprintln!("Error: call requires <TOOL> and <QUERY>");
            return ExitCode::FAILURE;
        }
    };

    let registry = tools::create_default_registry(config);
    let result = registry.execute(tool_name, json!({ "query": query })).await;

    if result.success {
        println!("{}", result.content);
        ExitCode::SUCCESS
    } else {
        eprintln!("Error: {}", result.content);
        ExitCode::FAILURE
    }
}

fn run_tools(config: Arc<Config>) -> ExitCode {
    let registry = tools::create_default_registry(config);
    match serde_json::to_string_pretty(&registry.get_tool_definitions()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to encode tool definitions: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_address(config: &Config) -> ExitCode {
    let signer = config
        .credential_resolver()
        .resolve()
        .map_err(|e| e.to_string())
        .and_then(|key| X402Signer::new(&key));

    match signer {
        Ok(signer) => {
            println!("{}", signer.address());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
