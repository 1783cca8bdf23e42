use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

use kinetic_graph::kinetic::checkpoint::{CheckpointStore, FileCheckpointStore};
use kinetic_graph::kinetic::config::ExecutorConfig;
use kinetic_graph::kinetic::workflow::builder::Builder;
use kinetic_graph::kinetic::workflow::graph::Edge;
use kinetic_graph::kinetic::workflow::registry::NodeRegistry;
use kinetic_graph::kinetic::workflow::state::State;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a graph definition and print the final state
    Run {
        /// Path to the graph YAML file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial state as a JSON object
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Thread id to resume from and checkpoint to
        #[arg(short, long)]
        thread: Option<String>,

        /// Fail after this many node invocations
        #[arg(long)]
        max_steps: Option<usize>,

        /// Directory for file checkpoints
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
    },
    /// Compile a graph definition without running it
    Validate {
        /// Path to the graph YAML file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List the checkpoints of a thread
    History {
        /// Thread id
        #[arg(short, long)]
        thread: String,

        /// Directory for file checkpoints
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = ExecutorConfig::from_env()?;

    match args.command {
        Commands::Run {
            file,
            input,
            thread,
            max_steps,
            checkpoint_dir,
        } => {
            let input: serde_json::Value =
                serde_json::from_str(&input).context("--input is not valid JSON")?;
            let Some(input) = State::from_json(input) else {
                bail!("--input must be a JSON object");
            };

            let mut builder = Builder::new(NodeRegistry::with_builtins());
            if let Some(dir) = checkpoint_dir.or_else(|| config.checkpoint_dir.clone()) {
                builder = builder.with_checkpointer(Arc::new(FileCheckpointStore::open(dir).await?));
            } else if thread.is_some() {
                log::warn!("--thread given without a checkpoint directory; nothing will be saved");
            }
            let graph = builder.build_graph(&file).await?;

            let mut run_config = config.run_config(thread);
            if max_steps.is_some() {
                run_config.max_steps = max_steps;
            }

            let output = graph.invoke(input, &run_config).await?;
            log::info!("Run {} visited {}", output.run_id, output.trace.join(" -> "));
            if let Some(checkpoint) = &output.checkpoint {
                log::info!(
                    "Saved checkpoint {} for thread {}",
                    checkpoint.sequence,
                    checkpoint.thread_id
                );
            }
            println!("{}", serde_json::to_string_pretty(&output.state)?);
        }
        Commands::Validate { file } => {
            let graph = Builder::new(NodeRegistry::with_builtins())
                .build_graph(&file)
                .await?;

            println!("Graph '{}' is valid", graph.name());
            println!("  entry: {}", graph.entry());
            for id in graph.node_ids() {
                let edge = match graph.edge(id) {
                    Some(Edge::Static(target)) => format!("-> {}", target),
                    Some(Edge::Conditional { destinations, .. }) => {
                        let mut labels: Vec<String> = destinations
                            .iter()
                            .map(|(label, target)| format!("{}: {}", label, target))
                            .collect();
                        labels.sort();
                        format!("-> {{ {} }}", labels.join(", "))
                    }
                    None => String::new(),
                };
                println!("  {} {}", id, edge);
            }
        }
        Commands::History {
            thread,
            checkpoint_dir,
        } => {
            let Some(dir) = checkpoint_dir.or(config.checkpoint_dir) else {
                bail!("no checkpoint directory: pass --checkpoint-dir or set KINETIC_GRAPH_CHECKPOINT_DIR");
            };
            let store = FileCheckpointStore::open(dir).await?;
            let history = store.history(&thread).await?;
            if history.is_empty() {
                println!("No checkpoints for thread '{}'", thread);
            }
            for checkpoint in history {
                println!(
                    "#{} {} {}",
                    checkpoint.sequence,
                    checkpoint.created_at.to_rfc3339(),
                    serde_json::to_string(&checkpoint.state)?
                );
            }
        }
    }

    Ok(())
}
