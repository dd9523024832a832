//! ZSEQ 命令行入口
//!
//! 无界面的前端：生成示例时序图、查看与校验已保存的文档、回放撤销/重做步骤。

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use config::AppConfig;
use zseq_core::prelude::*;
use zseq_file::{CanvasState, Document};

/// Headless sequence diagram editor
#[derive(Parser, Debug)]
#[command(name = "zseq")]
#[command(about = "Build, inspect and validate sequence diagram documents", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a demo diagram to a .json file
    Demo {
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
    /// List the entities of a saved document
    Inspect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
    /// Validate a saved document without modifying it
    Check {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
    /// Build the demo diagram and replay undo/redo steps on it
    Replay {
        /// Steps: 'u' for undo, 'r' for redo
        #[arg(value_name = "STEPS")]
        steps: String,

        /// Save the resulting document
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // 初始化日志
    let level = config.logging.max_level(cli.verbose)?;
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(level).finish(),
    )?;

    info!("Starting zseq...");

    match cli.command {
        Command::Demo { output } => {
            let mut document = build_demo(config.editor);
            document
                .save_as(&output)
                .with_context(|| format!("Failed to save {}", output.display()))?;
            println!(
                "Wrote {} entities to {}",
                document.diagram().registry().len(),
                output.display()
            );
        }
        Command::Inspect { input } => {
            let document = open(&input, config.editor)?;
            print_entities(document.diagram());
        }
        Command::Check { input } => check(&input)?,
        Command::Replay { steps, output } => {
            let mut document = build_demo(config.editor);
            replay(document.diagram_mut(), &steps)?;
            if let Some(output) = output {
                document
                    .save_as(&output)
                    .with_context(|| format!("Failed to save {}", output.display()))?;
            }
        }
    }

    Ok(())
}

fn open(path: &Path, config: DiagramConfig) -> Result<Document> {
    Document::open(path, config).with_context(|| format!("Failed to open {}", path.display()))
}

/// 登录流程示例：参与者、服务、消息、激活框、组合片段与注释
fn build_demo(config: DiagramConfig) -> Document {
    let mut document = Document::new(config);
    document.metadata.title = "Login flow".to_string();
    let diagram = document.diagram_mut();

    let user = diagram.create_entity(
        ElementKind::ActorWithLifeline,
        Point2::new(80.0, 40.0),
        Some("User"),
    );
    let server = diagram.create_entity(
        ElementKind::ClassWithLifeline,
        Point2::new(360.0, 40.0),
        Some("AuthServer"),
    );
    let request = diagram.create_entity(
        ElementKind::Message,
        Point2::new(110.0, 220.0),
        Some("login(name, password)"),
    );
    let reply = diagram.create_entity(
        ElementKind::Message,
        Point2::new(110.0, 320.0),
        Some("token"),
    );
    diagram.create_entity(
        ElementKind::CombinedFragment,
        Point2::new(40.0, 180.0),
        Some("alt"),
    );
    diagram.create_entity(
        ElementKind::Note,
        Point2::new(700.0, 60.0),
        Some("Tokens expire after one hour"),
    );

    for (entity, y) in [(user, 230.0), (server, 240.0)] {
        if let Err(e) = diagram.add_activation_box(entity, y) {
            warn!("Demo activation box on {} failed: {}", entity, e);
        }
    }
    for (entity, key, value) in [
        (reply, "type", "return"),
        (reply, "orientation", "left"),
        (request, "type", "synchronous"),
    ] {
        if let Err(e) = diagram.set_property(entity, key, value) {
            warn!("Demo property {} on {} failed: {}", key, entity, e);
        }
    }
    document
}

fn print_entities(diagram: &Diagram) {
    for element in diagram.registry().all() {
        let mut line = format!(
            "{:>4}  {:<18} {} parts",
            element.id(),
            element.kind(),
            element.parts().len()
        );
        let boxes = element.activation_boxes().len();
        if boxes > 0 {
            line.push_str(&format!(", {} activation boxes", boxes));
        }
        if element.is_destroyed_marked() {
            line.push_str(", destroyed");
        }
        println!("{}", line);
    }
    println!("{} entities", diagram.registry().len());
}

/// 校验文档：格式、版本以及每个实体能否重建
fn check(path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let state = CanvasState::parse(&json).with_context(|| format!("{} is not a valid document", path.display()))?;

    let mut diagram = Diagram::default();
    let summary = diagram.import_objects(&state.objects)?;
    println!(
        "{}: {} objects, {} entities, {} skipped, {} free primitives",
        path.display(),
        state.objects.len(),
        summary.entities,
        summary.skipped_groups,
        summary.free_primitives
    );
    if summary.skipped_groups > 0 {
        bail!("{} entities could not be reconstructed", summary.skipped_groups);
    }
    Ok(())
}

fn replay(diagram: &mut Diagram, steps: &str) -> Result<()> {
    for step in steps.chars().filter(|c| !c.is_whitespace()) {
        let applied = match step {
            'u' => diagram.undo(),
            'r' => diagram.redo(),
            other => bail!("Unknown replay step '{}'", other),
        };
        println!(
            "{} -> cursor {} of {}, {} entities{}",
            step,
            diagram.history().cursor(),
            diagram.history().len(),
            diagram.registry().len(),
            if applied { "" } else { " (no-op)" }
        );
    }
    Ok(())
}
