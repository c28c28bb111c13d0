/// Main entry point for the MCP Forge command line
///
/// This file sets up logging, parses command line arguments, and dispatches to
/// the compliance harness or the static project validator. Reports go to
/// stdout; logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{error, info};

use mcp_forge::report::render;
use mcp_forge::validator;
use mcp_forge::{run_test_suite, HarnessConfig, OutputFormat, ServerCommand};

/// Exit status for a command string that cannot be run at all
const EXIT_USAGE: i32 = 2;

/// Command line arguments for MCP Forge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the protocol compliance suite against a stdio MCP server
    Test(TestArgs),
    /// Check a generated server project without running it
    Validate(ValidateArgs),
}

#[derive(ClapArgs, Debug)]
struct TestArgs {
    /// Command that starts the server, e.g. "python -m my_server.server"
    #[arg(long = "cmd")]
    command: String,

    /// Working directory for the server process
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// How long the server must stay up after spawning before it counts as started
    #[arg(long, default_value_t = 500)]
    startup_timeout_ms: u64,

    /// How long to wait for each response
    #[arg(long, default_value_t = 10000)]
    request_timeout_ms: u64,

    /// How long the server gets to exit once stdin is closed
    #[arg(long, default_value_t = 5000)]
    shutdown_timeout_ms: u64,

    /// Error code accepted for the unknown-method case (repeatable, default -32601)
    #[arg(long = "accept-error-code", allow_negative_numbers = true)]
    accept_error_codes: Vec<i64>,

    /// Fail server_stop when the server has to be killed
    #[arg(long)]
    strict_shutdown: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(ClapArgs, Debug)]
struct ValidateArgs {
    /// Project directory to check
    project_dir: PathBuf,

    /// JSON file of tool definitions to check as well
    #[arg(long)]
    tools: Option<PathBuf>,

    /// JSON file of resource descriptors to check as well
    #[arg(long)]
    resources: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Set up logging based on command line flags
    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("mcp_forge={}", log_level))
        .with_writer(std::io::stderr) // Send logs to stderr, not stdout
        .init();

    let code = match args.command {
        Command::Test(test) => run_test(test).await?,
        Command::Validate(validate) => run_validate(validate)?,
    };
    std::process::exit(code);
}

async fn run_test(args: TestArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let command = match ServerCommand::parse(&args.command) {
        Ok(command) => command,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            return Ok(EXIT_USAGE);
        }
    };

    let mut config = HarnessConfig::new(command);
    config.working_dir = args.cwd;
    config.startup_timeout = Duration::from_millis(args.startup_timeout_ms);
    config.request_timeout = Duration::from_millis(args.request_timeout_ms);
    config.shutdown_timeout = Duration::from_millis(args.shutdown_timeout_ms);
    config.strict_shutdown = args.strict_shutdown;
    if !args.accept_error_codes.is_empty() {
        config.unknown_method_codes = args.accept_error_codes;
    }

    let report = run_test_suite(&config).await;
    println!("{}", render(&report, args.format)?);
    Ok(report.exit_code())
}

fn run_validate(args: ValidateArgs) -> Result<i32, Box<dyn std::error::Error>> {
    info!("Validating project at: {}", args.project_dir.display());

    let mut findings = validator::validate_project_structure(&args.project_dir);
    if let Some(tools) = &args.tools {
        findings.merge(validator::validate_tools_file(tools)?);
    }
    if let Some(resources) = &args.resources {
        findings.merge(validator::validate_resources_file(resources)?);
    }

    let report = findings.into_run_report(
        "MCP Forge Validation Results",
        &args.project_dir.display().to_string(),
    );
    println!("{}", render(&report, args.format)?);
    Ok(report.exit_code())
}
