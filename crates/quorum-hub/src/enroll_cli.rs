//! quorum-enroll CLI tool
//!
//! Obtains a genesis configuration for the local node and writes it out for
//! the node daemon.
//!
//! Usage:
//!   quorum-enroll enroll <coordinator> <name> [--node]
//!   quorum-enroll connect <peer>

use std::path::PathBuf;
use std::time::Duration;

use quorum_hub::{env, BootstrapClient, FileLauncher, Participant, ParticipantInfo};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

enum Command {
    Enroll {
        coordinator: String,
        name: String,
        validator: bool,
    },
    Connect {
        peer: String,
    },
}

fn print_usage() {
    eprintln!("quorum-enroll - Obtain a genesis configuration for this node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  quorum-enroll enroll <coordinator> <name> [--node]   Join a bootstrap round");
    eprintln!("  quorum-enroll connect <peer>                         Copy a running node's config");
    eprintln!();
    eprintln!("  --node   Enroll without asking for a validator slot");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUORUM_PUBLIC_KEY      Node public key (required)");
    eprintln!("  QUORUM_ADDRESS         Account address (required)");
    eprintln!("  ENODE_HOST             Advertised host (default: host name)");
    eprintln!("  ENODE_PORT             Advertised port (default: 30303)");
    eprintln!("  QUORUM_OUTPUT_DIR      Where to write genesis.json and peers.txt (default: ./quorum-data)");
    eprintln!("  QUORUM_RESPONSE_TIMEOUT_SECS  Give up waiting for the coordinator after this long");
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args.get(1).map(String::as_str) {
        Some("enroll") => {
            let positional: Vec<&String> = args[2..].iter().filter(|a| !a.starts_with("--")).collect();
            if positional.len() < 2 {
                return Err("enroll requires <coordinator> and <name> arguments".into());
            }
            if let Some(flag) = args[2..]
                .iter()
                .find(|a| a.starts_with("--") && a.as_str() != "--node")
            {
                return Err(format!("unknown flag {}", flag));
            }
            Ok(Command::Enroll {
                coordinator: positional[0].clone(),
                name: positional[1].clone(),
                validator: !args[2..].iter().any(|a| a == "--node"),
            })
        }
        Some("connect") => match args.get(2) {
            Some(peer) => Ok(Command::Connect { peer: peer.clone() }),
            None => Err("connect requires a <peer> argument".into()),
        },
        Some(other) => Err(format!("Unknown command: {}", other)),
        None => Err("missing command".into()),
    }
}

async fn run(command: Command) -> quorum_hub::Result<()> {
    let public_key = env::require("QUORUM_PUBLIC_KEY")?;
    let address = env::require("QUORUM_ADDRESS")?;
    let output_dir = env::var("QUORUM_OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./quorum-data"));

    let mut client = BootstrapClient::new();
    if let Some(secs) = env::parse::<u64>("QUORUM_RESPONSE_TIMEOUT_SECS")?.filter(|s| *s > 0) {
        client = client.with_response_timeout(Duration::from_secs(secs));
    }

    let info = ParticipantInfo::from_env(public_key, address)?;
    let mut participant = Participant::new(info, client);

    let output = match command {
        Command::Enroll {
            coordinator,
            name,
            validator,
        } => participant.enroll(&coordinator, &name, validator).await,
        Command::Connect { peer } => participant.connect(&peer).await,
    }?;

    println!("genesis fingerprint: {}", output.genesis.fingerprint());
    for peer in &output.peers {
        println!("peer: {}", peer);
    }

    let mut launcher = FileLauncher::new(&output_dir);
    participant.launch(&mut launcher)?;
    println!("configuration written to {}", output_dir.display());
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quorum_hub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if matches!(args.get(1).map(String::as_str), Some("-h" | "--help" | "help")) {
        print_usage();
        std::process::exit(0);
    }

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
