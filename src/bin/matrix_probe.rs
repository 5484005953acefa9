//! Matrix Probe CLI
//!
//! Sends a single command to the configured MTX unit and prints the reply.
//! Connection settings come from the normal bridge configuration
//! (config file, `AUDAC_*` environment variables).
//!
//! Usage:
//!   matrix-probe info [zone] [--json]
//!   matrix-probe volume <zone> <percent>
//!   matrix-probe mute <zone> <on|off>
//!   matrix-probe source <zone> <index|label>

use anyhow::{anyhow, bail, Context, Result};
use futures::future::join_all;
use std::env;
use std::process;

use audac_mtx_bridge::config;
use audac_mtx_bridge::{AudacClient, ZoneState};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  matrix-probe info [zone] [--json]");
    eprintln!("  matrix-probe volume <zone> <percent>");
    eprintln!("  matrix-probe mute <zone> <on|off>");
    eprintln!("  matrix-probe source <zone> <index|label>");
}

fn parse_zone(arg: Option<&String>) -> Result<u8> {
    let arg = arg.ok_or_else(|| anyhow!("missing zone"))?;
    arg.parse().with_context(|| format!("invalid zone {:?}", arg))
}

fn print_state(zone: u8, state: Option<ZoneState>, json: bool) -> Result<()> {
    match (state, json) {
        (Some(state), true) => println!("{}", serde_json::to_string(&state)?),
        (Some(state), false) => println!(
            "zone {}: volume {}% ({} units) source {} ({}) mute {} bass {} treble {}",
            zone,
            state.volume_percent(),
            state.volume,
            state.source,
            state.source_label().unwrap_or("none"),
            state.mute,
            state.bass,
            state.treble
        ),
        (None, true) => println!("null"),
        (None, false) => println!("zone {}: no usable reply", zone),
    }
    Ok(())
}

async fn run(args: &[String]) -> Result<()> {
    let json = args.iter().any(|a| a == "--json");
    let args: Vec<&String> = args.iter().filter(|a| *a != "--json").collect();
    let Some(command) = args.first() else {
        bail!("missing command");
    };

    let config = config::load_config()?;
    let client = AudacClient::new(config.matrix);

    match command.as_str() {
        "info" => {
            let zones: Vec<u8> = match args.get(1) {
                Some(_) => vec![parse_zone(args.get(1).copied())?],
                None => (1..=client.zones()).collect(),
            };
            // Queries run concurrently; the client puts them on the wire one by one
            let replies = join_all(zones.iter().map(|&zone| client.get_zone_info(zone))).await;
            for (zone, reply) in zones.into_iter().zip(replies) {
                print_state(zone, reply?, json)?;
            }
        }
        "volume" => {
            let zone = parse_zone(args.get(1).copied())?;
            let percent: i32 = args
                .get(2)
                .ok_or_else(|| anyhow!("missing percent"))?
                .parse()
                .context("invalid percent")?;
            println!("{}", client.set_volume(zone, percent).await?);
        }
        "mute" => {
            let zone = parse_zone(args.get(1).copied())?;
            let muted = match args.get(2).map(|s| s.as_str()) {
                Some("on") | Some("1") | Some("true") => true,
                Some("off") | Some("0") | Some("false") => false,
                other => bail!("expected on|off, got {:?}", other),
            };
            println!("{}", client.set_mute(zone, muted).await?);
        }
        "source" => {
            let zone = parse_zone(args.get(1).copied())?;
            let source = args.get(2).ok_or_else(|| anyhow!("missing source"))?;
            match source.parse::<i32>() {
                Ok(index) => println!("{}", client.set_source(zone, index).await?),
                Err(_) => match client.set_source_by_label(zone, source).await? {
                    Some(reply) => println!("{}", reply),
                    None => bail!("unknown source {:?}", source),
                },
            }
        }
        other => bail!("unknown command {:?}", other),
    }

    client.close().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        process::exit(if args.is_empty() { 2 } else { 0 });
    }

    if let Err(e) = run(&args).await {
        eprintln!("error: {:#}", e);
        print_usage();
        process::exit(1);
    }
}
