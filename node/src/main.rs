//! Agora Node Binary

use agora_ballot::BallotManifest;
use agora_core::{Address, NodeConfig};
use agora_crypto::{KeyInfo, KeyPair};
use agora_node::NodeBuilder;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "agora-node")]
#[command(about = "Agora Node - Single-organizer ballot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Ballot manifest path
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Owner address (hex), overrides the manifest owner
        #[arg(long)]
        owner: Option<String>,

        /// API listen address
        #[arg(long)]
        api_addr: Option<String>,
    },

    /// Generate a new keypair
    Keygen {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a ballot manifest
    Manifest {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Ballot name
        #[arg(long, default_value = "Agora Ballot")]
        name: String,

        /// Owner address (hex)
        #[arg(long)]
        owner: String,

        /// Voter addresses (hex)
        #[arg(long = "voter")]
        voters: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            manifest,
            owner,
            api_addr,
        } => {
            let config = match config {
                Some(path) => NodeConfig::from_json(&std::fs::read_to_string(&path)?)?,
                None => NodeConfig::default(),
            };
            init_logging(&config.log_level);

            info!("Starting Agora node...");

            let mut builder = NodeBuilder::new().config(config);

            if let Some(path) = manifest {
                let content = std::fs::read_to_string(&path)?;
                builder = builder.manifest(BallotManifest::from_json(&content)?);
                info!("Loaded manifest from {}", path.display());
            }

            if let Some(owner) = owner {
                builder = builder.owner(parse_address(&owner)?);
            }

            if let Some(addr) = api_addr {
                builder = builder.api_addr(&addr);
            }

            let node = builder.build()?;

            node.start().await?;
        }

        Commands::Keygen { output } => {
            let keypair = KeyPair::generate();
            let json = serde_json::to_string_pretty(&KeyInfo::from(&keypair))?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    println!("Keypair saved to: {}", path.display());
                }
                None => {
                    println!("{}", json);
                }
            }
        }

        Commands::Manifest {
            output,
            name,
            owner,
            voters,
        } => {
            let mut manifest = BallotManifest::new(&name, &parse_address(&owner)?);
            for voter in &voters {
                manifest = manifest.add_voter(&parse_address(voter)?);
            }
            manifest.parse_voters()?;

            std::fs::write(&output, manifest.to_json()?)?;

            println!("Ballot manifest saved to: {}", output.display());
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn parse_address(s: &str) -> anyhow::Result<Address> {
    Address::from_hex(s).map_err(|e| anyhow::anyhow!("invalid address {}: {}", s, e))
}
