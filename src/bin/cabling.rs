use clap::{Parser, Subcommand};
use module_db::adapters::http::SnapshotRequest;
use module_db::domain::model::{CableLink, Collection, Document, PeerKind, Port, Side};
use module_db::utils::error::{ErrorCategory, InventoryError};
use module_db::utils::logger;
use module_db::ApiClient;

#[derive(Parser)]
#[command(name = "cabling")]
#[command(about = "Command-line client for the module-db cabling API")]
struct Args {
    /// Base URL of the module-db server
    #[arg(long, default_value = "http://127.0.0.1:5005")]
    server: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Link port A of one cable to port B of another, mirrored on both cables
    Connect(LinkArgs),
    /// Remove a cable-to-cable link in both directions
    Disconnect(LinkArgs),
    /// Resolve the cabling path from a module, crate or cable
    Path {
        name: String,
        #[arg(long, default_value = "detSide")]
        side: Side,
        #[arg(long)]
        port: Option<Port>,
        /// Restrict the starting point lookup to module, crate or cable
        #[arg(long = "type")]
        kind: Option<PeerKind>,
    },
    /// Fetch one record
    Get { collection: Collection, key: String },
    /// List a collection
    List { collection: Collection },
    /// Insert a JSON document read from a file
    Insert {
        collection: Collection,
        file: String,
    },
}

#[derive(clap::Args)]
struct LinkArgs {
    cable1: String,
    #[arg(long, default_value = "1")]
    port1: Port,
    #[arg(long, default_value = "crateSide")]
    side: Side,
    cable2: String,
    #[arg(long, default_value = "1")]
    port2: Port,
}

impl From<LinkArgs> for CableLink {
    fn from(args: LinkArgs) -> Self {
        CableLink {
            cable1_name: args.cable1,
            cable1_port: args.port1,
            cable1_side: args.side,
            cable2_name: args.cable2,
            cable2_port: args.port2,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if let Err(e) = run(args).await {
        tracing::debug!("Command failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(exit_code(&e));
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), InventoryError> {
    let client = ApiClient::new(&args.server)?;

    match args.command {
        Command::Connect(link) => {
            println!("{}", client.connect_cables(&link.into()).await?);
        }
        Command::Disconnect(link) => {
            println!("{}", client.disconnect_cables(&link.into()).await?);
        }
        Command::Path {
            name,
            side,
            port,
            kind,
        } => {
            let request = SnapshotRequest {
                starting_point_name: name,
                starting_side: side,
                starting_port: port,
                starting_point_type: kind,
            };
            let report = client.cabling_snapshot(&request).await?;
            println!("{}", report.cabling_path.join(" -> "));
            if report.incomplete {
                match report.reason {
                    Some(reason) => println!("⚠️  incomplete: {}", reason),
                    None => println!("⚠️  incomplete"),
                }
            }
        }
        Command::Get { collection, key } => {
            let document = client.get(collection, &key).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Command::List { collection } => {
            let documents = client.list(collection).await?;
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        Command::Insert { collection, file } => {
            let content = std::fs::read_to_string(&file)?;
            let document: Document = serde_json::from_str(&content)?;
            println!("{}", client.insert(collection, &document).await?);
        }
    }

    Ok(())
}

fn exit_code(error: &InventoryError) -> i32 {
    match error {
        InventoryError::UnexpectedResponse { status: 404, .. } => 3,
        InventoryError::UnexpectedResponse { status, .. } if *status < 500 => 4,
        _ => match error.category() {
            ErrorCategory::NotFound => 3,
            ErrorCategory::Validation | ErrorCategory::Conflict | ErrorCategory::Traversal => 4,
            ErrorCategory::Configuration => 2,
            ErrorCategory::Storage | ErrorCategory::Remote => 1,
        },
    }
}
