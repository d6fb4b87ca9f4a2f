use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use md2_parse::logging::TracingSink;
use md2_parse::{GeneratorContext, MetadataRepo, split_front_matter};
use tracing_subscriber::EnvFilter;

mod config;

use config::{Md2Config, load_config};

#[derive(Parser)]
#[command(name = "md2", version, about = "Convert md2 markup to HTML, LaTeX or HWP")]
struct Cli {
    /// Only log errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum RenderFormat {
    Html,
    Latex,
    Hwp,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an md2 file
    Render {
        /// Path to the .md file
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "html")]
        format: RenderFormat,

        /// Directory whose .md files provide cross-reference metadata
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Config file (default: ./md2.json if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Answer one JSON conversion request read from stdin
    ServeOnce,

    /// Print the front matter of a file as JSON
    Metadata {
        /// Path to the .md file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("{}: {e:#}", "error".red().bold());
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Render {
            file,
            format,
            metadata,
            config,
        } => {
            let cwd = std::env::current_dir().context("Failed to read the working directory")?;
            let config = load_config(config.as_deref(), &cwd)?;
            let output = handle_render(&file, format, metadata.as_deref(), config)?;
            println!("{output}");
        }
        Commands::ServeOnce => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read request from stdin")?;
            println!("{}", md2_parse::service::handle_raw_with(&body, &TracingSink));
        }
        Commands::Metadata { file } => {
            let content = read_source(&file)?;
            let (metadata, _) = split_front_matter(&content);
            let metadata = metadata
                .ok_or_else(|| anyhow::anyhow!("'{}' has no front matter", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }

    Ok(())
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", file.display(), e))
}

fn handle_render(
    file: &Path,
    format: RenderFormat,
    metadata_dir: Option<&Path>,
    config: Md2Config,
) -> Result<String> {
    let content = read_source(file)?;
    let (_, body) = split_front_matter(&content);

    let repo = match metadata_dir {
        Some(dir) => load_metadata(dir)?,
        None => MetadataRepo::new(),
    };

    let sink = TracingSink;
    let tree = md2_parse::Parser::with_sink(&sink).parse(body);
    let context = GeneratorContext::new().with_metadata(&repo).with_sink(&sink);

    let output = match format {
        RenderFormat::Html => md2_parse::generate_html(&tree, &config.html, &context),
        RenderFormat::Latex => md2_parse::generate_latex(&tree, &config.latex, &context),
        RenderFormat::Hwp => {
            let mut ids = config.hwp_ids;
            let output = md2_parse::generate_hwp(&tree, &config.hwp, &mut ids, &context);
            tracing::debug!(
                inst_id = ids.inst_id,
                z_order = ids.z_order,
                bin_item = ids.bin_item,
                "next free hwp ids"
            );
            output
        }
    };
    Ok(output)
}

/// Register the front matter of every `.md` file directly inside `dir`.
fn load_metadata(dir: &Path) -> Result<MetadataRepo> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read metadata directory '{}'", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut repo = MetadataRepo::new();
    for path in paths {
        let content = read_source(&path)?;
        let Some(metadata) = split_front_matter(&content).0 else {
            tracing::debug!(file = %path.display(), "no front matter");
            continue;
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        repo.register(&name, metadata)?;
    }
    tracing::debug!(files = repo.len(), "registered metadata");
    Ok(repo)
}
