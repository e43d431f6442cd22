//! # Stacker CLI
//!
//! Command-line interface for the block-stacking planner.
//!
//! Usage:
//!   stacker run --frames <top.jpg> <side.jpg> [side2.jpg ...]
//!   stacker scene <image>
//!   stacker interpret <top.jpg> <side.jpg>
//!   stacker prompt --scene <reply.json> --task <text>
//!   stacker encode <image>
//!
//! Examples:
//!   stacker run --frames frames/*.jpg --iterations 4 --report run.json
//!   stacker -v scene frames/side_0.jpg
//!   stacker prompt --scene reply.json --task "Stack the red block on the blue block"

use clap::{Parser, Subcommand};
use stacker_agent::{FileCamera, LoggingRobot, Planner, PlannerConfig, StackerConfig};
use stacker_vlm::error::provider_error;
use stacker_vlm::{
    encode_image, next_move_prompt, support_map, Error, ErrorKind, OpenAIProvider, PromptTemplates,
    ReplyParser, Result, RgbFrame,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "stacker.toml";

#[derive(Parser)]
#[command(name = "stacker")]
#[command(author, version, about = "Stacker - vision-language planning for block stacking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./stacker.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output (debug logging, prompts and raw replies)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only show results
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full planning loop against recorded frames
    Run {
        /// Frames served in capture order: top view, side view, then one per iteration
        #[arg(short, long, required = true, num_args = 1..)]
        frames: Vec<PathBuf>,

        /// Override the iteration budget
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Write the run report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Ask the model for the scene state of one image
    Scene {
        #[arg(required = true)]
        image: PathBuf,
    },
    /// Ask the model for the goal shown in a top and a side view
    Interpret {
        #[arg(required = true)]
        top: PathBuf,
        #[arg(required = true)]
        side: PathBuf,
    },
    /// Print the next-move prompt for a saved scene reply (no model call)
    Prompt {
        /// File holding the scene-state JSON reply
        #[arg(short, long)]
        scene: PathBuf,

        /// Task interpretation to embed
        #[arg(short, long)]
        task: String,
    },
    /// Print the JPEG data-URI for an image
    Encode {
        #[arg(required = true)]
        image: PathBuf,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let fallback = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>, iterations: Option<usize>) -> Result<StackerConfig> {
    let mut config = match path {
        Some(path) => StackerConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => StackerConfig::load(DEFAULT_CONFIG)?,
        None => StackerConfig::default(),
    };

    if let Some(n) = iterations {
        config.run.max_iterations = n;
        config.validate()?;
    }
    Ok(config)
}

fn build_planner(
    config: &StackerConfig,
    frames: Vec<PathBuf>,
) -> Result<Planner<OpenAIProvider, FileCamera, LoggingRobot>> {
    let provider = OpenAIProvider::new(config.provider_config()?)
        .map_err(|e| provider_error(e).with_operation("cli::build_planner"))?;
    let camera = FileCamera::new(frames)?;
    Planner::new(provider, camera, LoggingRobot::new(), PlannerConfig::from(config))
}

async fn run_loop(
    config: &StackerConfig,
    frames: Vec<PathBuf>,
    report_path: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let mut planner = build_planner(config, frames)?;

    let task = planner.interpret_task().await?;
    if !quiet {
        println!("--- TASK ---\n{}\n", task);
    }

    while !planner.is_terminated() {
        let step = planner.step().await?;
        println!("[{}] {}", step.iteration, step.instruction);
    }

    let report = planner.into_report()?;
    if !quiet {
        println!(
            "\nTerminated: {:?} after {} step(s), {} model calls, {} tokens",
            report.termination,
            report.steps.len(),
            report.usage.total_calls,
            report.usage.total_tokens()
        );
    }

    if let Some(path) = report_path {
        std::fs::write(path, report.to_json()?).map_err(|e| {
            Error::from(e)
                .with_operation("cli::write_report")
                .with_context("path", path.display().to_string())
        })?;
        if !quiet {
            println!("Report written to {}", path.display());
        }
    }
    Ok(())
}

async fn show_scene(config: &StackerConfig, image: PathBuf) -> Result<()> {
    let mut planner = build_planner(config, vec![image])?;
    let scene = planner.describe_scene().await?;

    let json = serde_json::to_string_pretty(&scene).map_err(|e| {
        Error::new(ErrorKind::SerializationFailed, e.to_string())
            .with_operation("cli::show_scene")
            .set_source(e)
    })?;
    println!("{}", json);
    Ok(())
}

async fn interpret(config: &StackerConfig, top: PathBuf, side: PathBuf) -> Result<()> {
    let mut planner = build_planner(config, vec![top, side])?;
    let task = planner.interpret_task().await?;
    println!("{}", task);
    Ok(())
}

fn show_prompt(scene_file: &Path, task: &str, verbose: bool) -> Result<()> {
    let raw = std::fs::read_to_string(scene_file).map_err(|e| {
        Error::from(e)
            .with_operation("cli::show_prompt")
            .with_context("path", scene_file.display().to_string())
    })?;
    let scene = ReplyParser::new()?.parse_scene_state(&raw)?;
    let templates = PromptTemplates::default();

    if verbose {
        println!("Support map:");
        for (supported, supporter) in support_map(&scene) {
            println!("  {} -> {}", supported, supporter);
        }
        println!();
    }
    println!("{}", next_move_prompt(&templates, &scene, task));
    Ok(())
}

fn encode(image: &Path) -> Result<()> {
    let frame = RgbFrame::open(image)?;
    let encoded = encode_image(&frame)?;
    println!("{}", encoded.data_uri());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run {
            frames,
            iterations,
            report,
        } => match load_config(cli.config.as_deref(), iterations) {
            Ok(config) => run_loop(&config, frames, report.as_deref(), cli.quiet).await,
            Err(e) => Err(e),
        },
        Commands::Scene { image } => match load_config(cli.config.as_deref(), None) {
            Ok(config) => show_scene(&config, image).await,
            Err(e) => Err(e),
        },
        Commands::Interpret { top, side } => match load_config(cli.config.as_deref(), None) {
            Ok(config) => interpret(&config, top, side).await,
            Err(e) => Err(e),
        },
        Commands::Prompt { scene, task } => show_prompt(&scene, &task, cli.verbose),
        Commands::Encode { image } => encode(&image),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
