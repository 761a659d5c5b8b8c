// Main entry point for hosttestify

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use hosttestify::cli::{Cli, Commands};
use hosttestify::commands;
use hosttestify::config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    hosttestify::logging::init(cli.verbose);

    if cli.verbose {
        info!("Starting hosttestify v{}", env!("CARGO_PKG_VERSION"));
    }

    if cli.no_color {
        console::set_colors_enabled(false);
    }

    if cli.config {
        return show_config(&cli);
    }

    if let Some(config_file) = &cli.init_config {
        let toml_content = config::Config::default().to_toml();
        std::fs::write(config_file, toml_content)?;
        println!("Configuration file created: {}", config_file.display());
        println!("\nYou can now edit the file to customize your settings.");
        print_precedence();
        return Ok(());
    }

    if let Some(shell_type) = &cli.completion {
        return commands::handle_completion(shell_type);
    }

    let code = match &cli.command {
        Some(Commands::Run(args)) => commands::run_tests(&cli, args).await,
        Some(Commands::Select(args)) => commands::handle_select(args).map(|_| 0),
        Some(Commands::Replay(args)) => commands::handle_replay(&cli, args),
        None => {
            warn!("No command given. Use 'hosttestify --help' for usage.");
            return Ok(());
        }
    };

    match code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(3);
        }
    }
}

fn show_config(cli: &Cli) -> Result<()> {
    println!("Current configuration:");

    match commands::resolve_config(cli)? {
        Some(cfg) => {
            println!("\n  Configuration file loaded:");
            println!("    Timeout: {}s", cfg.general.timeout);
            println!("    Root suite: {}", cfg.general.root_suite);
            if !cfg.general.suite_prefix.is_empty() {
                println!("    Suite prefix: {}", cfg.general.suite_prefix.join(" › "));
            }
            if let Some(ref program) = cfg.host.program {
                println!("    Test host: {}", program);
            }
            if !cfg.host.args.is_empty() {
                println!("    Host arguments: {}", cfg.host.args.join(" "));
            }
            println!(
                "    Selection: {}{}",
                if cfg.selection.invert { "not " } else { "" },
                cfg.selection.only
            );
            println!("    Progress mode: {}", cfg.progress.mode);
            println!(
                "    Color: {}",
                if cfg.progress.color {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            for (key, value) in &cfg.environment {
                println!("    Env {}={}", key, value);
            }
        }
        None => {
            println!("\n  No configuration file loaded");
            println!(
                "  Create one with: hosttestify --init-config {}",
                config::CONFIG_FILE_NAME
            );
        }
    }

    println!("\n  Environment variables:");
    match std::env::var(config::ENV_HOSTTESTIFY_TIMEOUT) {
        Ok(timeout) => println!("    {}: {}", config::ENV_HOSTTESTIFY_TIMEOUT, timeout),
        Err(_) => println!(
            "    {}: not set (default: {}s)",
            config::ENV_HOSTTESTIFY_TIMEOUT,
            config::default_timeout()
        ),
    }

    print_precedence();
    Ok(())
}

fn print_precedence() {
    println!("\nConfiguration precedence:");
    println!("  1. Command-line arguments (highest)");
    println!("  2. Configuration file");
    println!("  3. Environment variables");
    println!("  4. Built-in defaults (lowest)");
}
