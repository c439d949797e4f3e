//! caravel - declarative container stacks
//!
//! This is the CLI entry point. It loads the stack's config, declares
//! the desired-state graph, and hands it to the engine.

use caravel::config::{ConfigStore, StackConfig};
use caravel::engine::Engine;
use caravel::error::Result;
use caravel::resource::{Output, StackGraph};
use caravel::stack;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// caravel - declarative container stacks
#[derive(Parser)]
#[command(name = "caravel")]
#[command(version)]
#[command(about = "Declare a multi-container stack and let the engine reconcile it", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Stack name
    #[arg(short, long, global = true, default_value = "dev")]
    stack: String,

    /// Project directory containing stacks/ and app/
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build images and start the stack's containers
    Up,

    /// Remove the stack's containers and network
    Down,

    /// Render the desired-state plan without contacting the engine
    Plan,

    /// Print stack outputs
    Output {
        /// Output name (all outputs when omitted)
        name: Option<String>,

        /// Print secret outputs in plaintext
        #[arg(long)]
        show_secrets: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = ConfigStore::load(&cli.project_dir, &cli.stack)?;
    let config = StackConfig::from_store(&store)?;
    let graph = stack::declare(&config, &cli.project_dir)?;

    match cli.command {
        Commands::Up => {
            let engine = Engine::new()?;
            let report = engine.apply(&graph).await?;
            print!("{}", report.render());
            print_outputs(&graph, None, false)?;
        }

        Commands::Down => {
            let engine = Engine::new()?;
            let report = engine.destroy(&graph).await?;
            print!("{}", report.render());
        }

        Commands::Plan => {
            print!("{}", graph.render()?);
        }

        Commands::Output { name, show_secrets } => {
            print_outputs(&graph, name.as_deref(), show_secrets)?;
        }
    }

    Ok(())
}

/// Print one or all stack outputs, masking secrets unless asked not to
fn print_outputs(graph: &StackGraph, name: Option<&str>, show_secrets: bool) -> Result<()> {
    let render = |output: &Output| {
        if show_secrets {
            output.revealed().to_string()
        } else {
            output.masked().to_string()
        }
    };

    match name {
        Some(name) => {
            let output = graph.output(name)?;
            println!("{}", render(output));
        }
        None => {
            for (name, output) in graph.outputs() {
                println!("{} = {}", name, render(output));
            }
        }
    }

    Ok(())
}
