//! qadeck CLI - serve the QA collaboration API and maintain its data.

use clap::Parser;
use qadeck::cli::{Cli, Commands, ConfigCommands, RepairCommands};
use qadeck::commands::{Output, maintenance};
use qadeck::config::{ConfigOverrides, ResolvedConfig, resolve_config};
use qadeck::storage::Storage;
use qadeck::{logging, server};
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    if let Err(e) = logging::init_logging(cli.verbose, cli.log_json) {
        eprintln!("Warning: {}", e);
    }

    let mut overrides = ConfigOverrides::new();
    if let Some(dir) = cli.data_dir {
        overrides = overrides.with_data_dir(dir);
    }

    if let Err(e) = run_command(cli.command, overrides, human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

fn run_command(
    command: Commands,
    mut overrides: ConfigOverrides,
    human: bool,
) -> qadeck::Result<()> {
    match command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                overrides = overrides.with_host(host);
            }
            if let Some(port) = port {
                overrides = overrides.with_port(port);
            }
            let config = resolve_config(&overrides)?;
            run_server(&config)?;
        }
        Commands::Repair { command } => {
            let config = resolve_config(&overrides)?;
            let mut storage = Storage::open(&config.data_dir.value)?;
            match command {
                RepairCommands::Ids { dry_run } => {
                    output(&maintenance::repair_ids(&mut storage, dry_run)?, human)
                }
                RepairCommands::Links { dry_run } => {
                    output(&maintenance::repair_links(&mut storage, dry_run)?, human)
                }
            }
        }
        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            let config = resolve_config(&overrides)?;
            output(&ConfigView(config), human);
        }
    }

    Ok(())
}

/// Run the API server on a fresh multi-threaded runtime.
fn run_server(config: &ResolvedConfig) -> qadeck::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| qadeck::Error::Other(format!("Failed to create runtime: {}", e)))?
        .block_on(server::start_server(config))
}

struct ConfigView(ResolvedConfig);

impl Output for ConfigView {
    fn to_json(&self) -> String {
        self.0.to_json().to_string()
    }

    fn to_human(&self) -> String {
        let c = &self.0;
        [
            format!("data dir:        {} ({})", c.data_dir.value.display(), c.data_dir.source),
            format!("host:            {} ({})", c.host.value, c.host.source),
            format!("port:            {} ({})", c.port.value, c.port.source),
            format!("upload dir:      {} ({})", c.upload_dir.value.display(), c.upload_dir.source),
            format!("token secret:    {} ({})", c.masked_secret(), c.token_secret.source),
            format!("token ttl hours: {} ({})", c.token_ttl_hours.value, c.token_ttl_hours.source),
            format!("demo tokens:     {} ({})", c.demo_tokens.value, c.demo_tokens.source),
            format!("max upload MB:   {} ({})", c.max_upload_mb.value, c.max_upload_mb.source),
        ]
        .join("\n")
    }
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
