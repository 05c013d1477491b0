//! deadswitch — command-line client and monitor for a dead-man's switch.
//!
//! Runs against a local, file-backed registry so a single host can act as
//! owner and beneficiary alike.
//!
//! # Usage
//!
//! ```bash
//! deadswitch --config /path/to/deadswitch.toml status
//! deadswitch heartbeat
//! deadswitch register --beneficiary bob --address tb1q… --days 90 --will "…"
//! deadswitch monitor
//! ```

mod commands;
mod config;
mod daemon;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Parsed command and its arguments
#[derive(Debug, PartialEq)]
enum Command {
    Status {
        json: bool,
    },
    Heartbeat,
    Register {
        beneficiary: String,
        address: String,
        days: Option<u64>,
        will: Vec<u8>,
    },
    Claims,
    Claim {
        owner: String,
    },
    Address {
        force: bool,
    },
    Credit {
        address: String,
        sats: u64,
    },
    Monitor,
}

fn main() -> Result<()> {
    // Parse CLI args (minimal, no clap)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/deadswitch.toml");
    let mut validate_only = false;
    let mut command_args: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("deadswitch {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            _ => {
                command_args = args[i..].to_vec();
                break;
            }
        }
        i += 1;
    }

    let command = parse_command(&command_args)?;

    // Load config
    let mut server_config = config::ServerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply env overrides
    server_config.apply_env_overrides();

    // Validate
    server_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &server_config.server.log_level);
    env_logger::init();

    if validate_only {
        println!("✅ Configuration is valid.");
        println!("  Network:       {}", server_config.bitcoin.network);
        println!("  Identity:      {}", server_config.identity.principal);
        println!("  Data dir:      {}", server_config.server.data_dir.display());
        println!("  Registry:      {}", server_config.state_path().display());
        println!("  Cache:         {}", server_config.cache_path().display());
        println!(
            "  Balance TTL:   {} secs",
            server_config.session.balance_ttl_secs
        );
        println!(
            "  Empty wills:   {}",
            if server_config.session.allow_empty_payload {
                "allowed"
            } else {
                "rejected"
            }
        );
        return Ok(());
    }

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    let result = match command {
        Command::Status { json } => rt.block_on(commands::status(&server_config, json)),
        Command::Heartbeat => rt.block_on(commands::heartbeat(&server_config)),
        Command::Register {
            beneficiary,
            address,
            days,
            will,
        } => rt.block_on(commands::register(
            &server_config,
            &beneficiary,
            &address,
            days,
            will,
        )),
        Command::Claims => rt.block_on(commands::claims(&server_config)),
        Command::Claim { owner } => rt.block_on(commands::claim(&server_config, &owner)),
        Command::Address { force } => rt.block_on(commands::address(&server_config, force)),
        Command::Credit { address, sats } => commands::credit(&server_config, &address, sats),
        Command::Monitor => rt.block_on(daemon::run(server_config)),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Parse `<command> [args…]`. No command means `status`.
fn parse_command(args: &[String]) -> Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Command::Status { json: false });
    };

    match name.as_str() {
        "status" => {
            let mut json = false;
            for arg in rest {
                match arg.as_str() {
                    "--json" => json = true,
                    other => anyhow::bail!("Unknown argument for status: {}", other),
                }
            }
            Ok(Command::Status { json })
        }
        "heartbeat" => {
            no_arguments(name, rest)?;
            Ok(Command::Heartbeat)
        }
        "register" => {
            let mut beneficiary = None;
            let mut address = None;
            let mut days = None;
            let mut will = Vec::new();

            let mut i = 0;
            while i < rest.len() {
                let flag = rest[i].as_str();
                let value = rest
                    .get(i + 1)
                    .with_context(|| format!("{} requires a value", flag))?;
                match flag {
                    "--beneficiary" => beneficiary = Some(value.clone()),
                    "--address" => address = Some(value.clone()),
                    "--days" => {
                        days = Some(
                            value
                                .parse::<u64>()
                                .with_context(|| format!("Invalid --days: {}", value))?,
                        )
                    }
                    "--will" => will = value.clone().into_bytes(),
                    "--will-file" => {
                        will = std::fs::read(value)
                            .with_context(|| format!("Failed to read will file: {}", value))?
                    }
                    other => anyhow::bail!("Unknown argument for register: {}", other),
                }
                i += 2;
            }

            Ok(Command::Register {
                beneficiary: beneficiary.context("register requires --beneficiary")?,
                address: address.context("register requires --address")?,
                days,
                will,
            })
        }
        "claims" => {
            no_arguments(name, rest)?;
            Ok(Command::Claims)
        }
        "claim" => match rest {
            [owner] => Ok(Command::Claim {
                owner: owner.clone(),
            }),
            _ => anyhow::bail!("usage: claim <owner>"),
        },
        "address" => {
            let mut force = false;
            for arg in rest {
                match arg.as_str() {
                    "--force" => force = true,
                    other => anyhow::bail!("Unknown argument for address: {}", other),
                }
            }
            Ok(Command::Address { force })
        }
        "credit" => match rest {
            [address, sats] => Ok(Command::Credit {
                address: address.clone(),
                sats: sats
                    .parse()
                    .with_context(|| format!("Invalid amount: {}", sats))?,
            }),
            _ => anyhow::bail!("usage: credit <address> <sats>"),
        },
        "monitor" => {
            no_arguments(name, rest)?;
            Ok(Command::Monitor)
        }
        other => anyhow::bail!("Unknown command: {}", other),
    }
}

fn no_arguments(command: &str, rest: &[String]) -> Result<()> {
    anyhow::ensure!(
        rest.is_empty(),
        "{} takes no arguments (got {})",
        command,
        rest.join(" ")
    );
    Ok(())
}

fn print_help() {
    println!(
        r#"deadswitch — dead-man's-switch client

USAGE:
    deadswitch [OPTIONS] [COMMAND]

OPTIONS:
    -c, --config <PATH>   Config file path (default: /config/deadswitch.toml)
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

COMMANDS:
    status [--json]       Show liveness, will status and pending claims (default)
    heartbeat             Broadcast proof of life
    register              Register or replace your will
        --beneficiary <ID>    Who may claim once you go silent
        --address <ADDR>      Where custody is transferred
        --days <N>            Heartbeat interval (default: session.heartbeat_days)
        --will <TEXT>         Sealed digital will
        --will-file <PATH>    Sealed digital will, read from a file
    claims                List wills naming you as beneficiary
    claim <OWNER>         Claim an expired will and print its secret
    address [--force]     Show the custody address and balance
    credit <ADDR> <SATS>  Credit confirmed funds in the local registry
    monitor               Run the 1 Hz liveness monitor until Ctrl-C

ENVIRONMENT VARIABLES (override config file):
    DEADSWITCH_DATA_DIR       Data directory path
    DEADSWITCH_LOG_LEVEL      Log level (error/warn/info/debug/trace)
    DEADSWITCH_NETWORK        Bitcoin network (bitcoin/testnet)
    DEADSWITCH_IDENTITY       Principal to act as
    DEADSWITCH_CUSTODY_KEY    Custody key (hex public key or address)

EXAMPLES:
    # Check in
    deadswitch --config deadswitch.toml heartbeat

    # Act as the beneficiary
    DEADSWITCH_IDENTITY=bob deadswitch claims

    # Validate configuration
    deadswitch --config deadswitch.toml --validate
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_default_command_is_status() {
        assert_eq!(parse_command(&[]).unwrap(), Command::Status { json: false });
        assert_eq!(
            parse_command(&args("status --json")).unwrap(),
            Command::Status { json: true }
        );
    }

    #[test]
    fn test_parse_register() {
        let command =
            parse_command(&args("register --beneficiary bob --address tb1qxyz --days 30 --will hi"))
                .unwrap();
        assert_eq!(
            command,
            Command::Register {
                beneficiary: "bob".into(),
                address: "tb1qxyz".into(),
                days: Some(30),
                will: b"hi".to_vec(),
            }
        );
    }

    #[test]
    fn test_register_requires_beneficiary() {
        assert!(parse_command(&args("register --address tb1qxyz")).is_err());
        assert!(parse_command(&args("register --beneficiary")).is_err());
    }

    #[test]
    fn test_parse_claim_and_credit() {
        assert_eq!(
            parse_command(&args("claim alice")).unwrap(),
            Command::Claim {
                owner: "alice".into()
            }
        );
        assert_eq!(
            parse_command(&args("credit tb1qxyz 5000")).unwrap(),
            Command::Credit {
                address: "tb1qxyz".into(),
                sats: 5000
            }
        );
        assert!(parse_command(&args("credit tb1qxyz lots")).is_err());
        assert!(parse_command(&args("claim")).is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse_command(&args("launch")).is_err());
        assert!(parse_command(&args("heartbeat now")).is_err());
    }
}
