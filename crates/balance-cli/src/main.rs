use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "balancectl",
    about = "balancegrid — dominant-resource balance scheduling",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the node snapshot in the state store
    Nodes {
        #[command(subcommand)]
        action: NodesAction,
    },
    /// Filter and score a pod against every stored node, without binding
    Score {
        /// Path to the state database
        #[arg(long)]
        db: PathBuf,
        /// Pod manifest (TOML)
        #[arg(long)]
        pod: PathBuf,
        /// Plugin configuration (balance.toml); defaults apply if omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Run a full scheduling cycle and bind the pod to the chosen node
    Schedule {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        pod: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List recorded placement decisions
    Decisions {
        #[arg(long)]
        db: PathBuf,
    },
}

#[derive(Subcommand)]
enum NodesAction {
    /// Load nodes (and optional pre-bound pods) from a cluster file
    Load {
        #[arg(long)]
        db: PathBuf,
        /// Cluster snapshot (TOML with [[nodes]] and [[bindings]])
        #[arg(long)]
        file: PathBuf,
        /// Plugin configuration used to parse binding quantities
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List stored nodes with their committed usage
    List {
        #[arg(long)]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("balance=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Nodes { action } => match action {
            NodesAction::Load { db, file, config } => {
                commands::nodes::load(&db, &file, config.as_deref())
            }
            NodesAction::List { db } => commands::nodes::list(&db).await,
        },
        Commands::Score { db, pod, config, format } => {
            commands::score::score(&db, &pod, config.as_deref(), &format).await
        }
        Commands::Schedule { db, pod, config } => {
            commands::schedule::schedule(&db, &pod, config.as_deref()).await
        }
        Commands::Decisions { db } => commands::decisions::list(&db),
    }
}
