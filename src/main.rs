use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use yt_merge::cli::Cli;
use yt_merge::config::Config;
use yt_merge::pipeline::RunSummary;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick a level from --verbose
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "yt_merge=debug".to_string()
        } else {
            "yt_merge=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_cli(&cli)?;
    let rt = tokio::runtime::Runtime::new()?;

    let summary = match rt.block_on(yt_merge::run(&config)) {
        Ok(summary) => summary,
        Err(e) => {
            // Failed before any stage ran (unsupported platform, HTTP client setup).
            eprintln!("Error: {}", e);
            return Ok(ExitCode::from(e.exit_code()));
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(ExitCode::from(summary.exit_code))
}

fn print_summary(summary: &RunSummary) {
    if let Some(listing) = &summary.format_listing {
        println!("Available formats for this source:\n{}\n", listing);
    }

    match (&summary.output, &summary.error) {
        (Some(output), _) => println!("Saved {}", output.display()),
        (None, Some(error)) => eprintln!("Error: {}", error),
        (None, None) => {}
    }

    if summary.cleanup.has_errors() {
        eprintln!("Warning: {}", summary.cleanup);
    } else {
        println!("{}", summary.cleanup);
    }
}
