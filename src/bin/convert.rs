//! Schema Convert CLI
//!
//! Converts serialized schema node graphs into JSON Schema documents, checks
//! values against them, and exports the flattened node graph.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use schema_flatten::{
    flatten, Converter, ConverterConfig, Document, DocumentValidator, OutputFormat, SchemaNode,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "schema-convert")]
#[command(about = "Convert schema node graphs to JSON Schema")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Accept dict nodes (pattern-keyed objects)
    #[arg(long, global = true)]
    allow_unsafe: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one node graph to a JSON Schema document
    Convert {
        /// Serialized node graph (JSON)
        #[arg(short, long)]
        input: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a node graph and validate a value against the result
    Check {
        /// Serialized node graph (JSON)
        #[arg(short, long)]
        input: PathBuf,
        /// Value to validate (JSON)
        #[arg(short, long)]
        value: PathBuf,
    },

    /// Export the flattened node graph to DOT
    Graph {
        /// Serialized node graph (JSON)
        #[arg(short, long)]
        input: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert every node graph under a directory
    Batch {
        /// Directory to scan
        #[arg(short, long)]
        dir: PathBuf,
        /// Write documents here instead of next to their inputs
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => ConverterConfig::load_from(Some(path)),
        None => ConverterConfig::load(),
    }
    .context("failed to load configuration")?;
    if cli.allow_unsafe {
        config.convert.allow_unsafe = true;
    }
    let converter = Converter::new(config.emit_options());

    match cli.command {
        Commands::Convert { input, output } => {
            let node = read_node(&input)?;
            let document = converter.convert(&node)?;
            let rendered = render(&document, config.export.output_format)?;
            write_or_print(output.as_deref(), &rendered)
        }

        Commands::Check { input, value } => {
            let node = read_node(&input)?;
            let document = converter.convert(&node)?;
            let validator = DocumentValidator::compile(&document)?;

            let content = fs::read_to_string(&value)
                .with_context(|| format!("failed to read {}", value.display()))?;
            let instance: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", value.display()))?;

            match validator.validate(&instance) {
                Ok(()) => {
                    println!("✅ {} is valid", value.display());
                    Ok(())
                }
                Err(errors) => {
                    println!("❌ {} is invalid:", value.display());
                    for error in &errors {
                        println!("   └─ {}", error);
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Graph { input, output } => {
            let node = read_node(&input)?;
            let graph = flatten(&node)?;
            for group in graph.recursive_groups() {
                info!(?group, "recursive node group");
            }
            write_or_print(output.as_deref(), &graph.to_dot())
        }

        Commands::Batch { dir, out_dir } => {
            if !dir.is_dir() {
                bail!("{} is not a directory", dir.display());
            }
            let node_suffix = config.export.node_suffix.as_str();
            let mut converted = 0usize;

            for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !path.is_file() || !file_name.ends_with(node_suffix) {
                    continue;
                }

                let stem = &file_name[..file_name.len() - node_suffix.len()];
                let target_name = format!("{}{}", stem, config.export.schema_suffix);
                let target = match &out_dir {
                    Some(out) => out.join(path.strip_prefix(&dir)?.with_file_name(&target_name)),
                    None => path.with_file_name(&target_name),
                };

                let node = read_node(path)?;
                let document = converter
                    .convert(&node)
                    .with_context(|| format!("failed to convert {}", path.display()))?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, render(&document, config.export.output_format)?)?;
                info!(source = %path.display(), target = %target.display(), "converted");
                converted += 1;
            }

            println!("✅ Converted {} node graph(s)", converted);
            Ok(())
        }
    }
}

fn read_node(path: &Path) -> anyhow::Result<SchemaNode> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    SchemaNode::from_json_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn render(document: &Document, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Pretty => document.to_json_pretty()?,
        OutputFormat::Compact => document.to_json()?,
    })
}

fn write_or_print(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            println!("✅ Written to {:?}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}
