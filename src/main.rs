use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gguf_edit::display::{metadata_rows, tensor_rows};
use gguf_edit::gguf::{default_output_path, EditRequest, Endian, GgufFile};
use gguf_edit::EditorConfig;

#[derive(Parser)]
#[command(name = "gguf-edit")]
#[command(about = "Inspect and edit GGUF model metadata", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML config file (defaults to ./gguf-edit.toml when present)
    #[arg(long, global = true, env = "GGUF_EDIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the metadata and tensor tables of a GGUF file
    Info {
        /// Path to the GGUF model file
        model: PathBuf,

        /// Also list every tensor descriptor
        #[arg(short, long)]
        tensors: bool,
    },

    /// Write an edited copy of a GGUF file
    Edit {
        /// Path to the GGUF model file
        model: PathBuf,

        /// Output path (defaults to <name>_edited.gguf next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace a metadata value: key=value (repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        set: Vec<(String, String)>,

        /// Drop a tensor from the tensor table (repeatable)
        #[arg(short = 'r', long = "remove-tensor", value_name = "NAME")]
        remove_tensor: Vec<String>,

        /// JSON edit request: {"metadata": {...}, "removed_tensors": [...]}
        #[arg(long, value_name = "FILE")]
        edits: Option<PathBuf>,

        /// Replace the output file if it already exists
        #[arg(long)]
        force: bool,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Info { model, tensors } => show_info(&model, cli.config.as_deref(), tensors),
        Commands::Edit {
            model,
            output,
            set,
            remove_tensor,
            edits,
            force,
        } => run_edit(&model, output, set, remove_tensor, edits.as_deref(), force),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn show_info(path: &Path, config: Option<&Path>, list_tensors: bool) -> gguf_edit::Result<()> {
    let config = EditorConfig::load(config)?;
    let file = GgufFile::open(path)?;
    let data = &file.data;

    println!("File: {}", path.display());
    println!("GGUF Version: {}", data.header.version);
    println!(
        "Byte order: {}",
        match data.endian {
            Endian::Little => "little-endian",
            Endian::Big => "big-endian",
        }
    );
    println!("Alignment: {}", data.alignment);
    println!("Tensor data offset: {}", data.data_offset);
    println!("Tensor data size: {} bytes", file.data_len());
    println!();

    println!("Metadata ({} entries):", data.metadata.len());
    let rows = metadata_rows(data, &config);
    let key_width = rows.iter().map(|r| r.key.len()).max().unwrap_or(0);
    for row in rows {
        println!(
            "  {:<key_width$}  {:<7}  {}",
            row.key,
            row.value_type.name(),
            row.value
        );
    }
    println!();

    println!("Tensors ({} entries):", data.tensors.len());
    if list_tensors {
        let rows = tensor_rows(data, &BTreeSet::new());
        let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
        for row in rows {
            println!(
                "  {:<name_width$}  {:<20}  {:<8}  @{}",
                row.name, row.shape, row.dtype, row.offset
            );
        }
    }

    Ok(())
}

fn run_edit(
    path: &Path,
    output: Option<PathBuf>,
    set: Vec<(String, String)>,
    remove_tensor: Vec<String>,
    edits: Option<&Path>,
    force: bool,
) -> gguf_edit::Result<()> {
    let mut request = match edits {
        Some(p) => serde_json::from_str::<EditRequest>(&std::fs::read_to_string(p)?)?,
        None => EditRequest::new(),
    };
    for (key, value) in set {
        request = request.set(key, value);
    }
    for name in remove_tensor {
        request = request.remove_tensor(name);
    }

    let output = output.unwrap_or_else(|| default_output_path(path));
    if output.exists() && !force {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} exists; pass --force to replace it", output.display()),
        )
        .into());
    }

    let file = GgufFile::open(path)?;
    if request.is_empty() {
        tracing::warn!("no edits requested; writing an identical copy");
    }
    let written = file.save_as(&output, &request)?;

    println!(
        "Saved {} ({} bytes, {} metadata edits, {} tensors removed)",
        output.display(),
        written,
        request.metadata.len(),
        request.removed_tensors.len()
    );
    Ok(())
}
