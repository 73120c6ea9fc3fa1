//! J4P CLI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use j4p_core::Dataset;
use j4p_skim::lists::split_inline_list;
use j4p_skim::{RunRange, SkimConfig, read_skim_config, run_skim};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "j4p")]
#[command(about = "J4P - tag-and-probe skims for jet energy corrections")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Skim NanoAOD partitions into a tag-and-probe table
    Skim(SkimArgs),

    /// Print version information
    Version,
}

#[derive(Args)]
struct SkimArgs {
    /// Skim config (YAML, or JSON by extension). Other flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated input partitions
    #[arg(long, conflicts_with = "filepath")]
    filelist: Option<String>,

    /// File listing one input partition per line
    #[arg(long)]
    filepath: Option<PathBuf>,

    /// Comma-separated trigger names (OR-ed)
    #[arg(long, conflicts_with = "triggerpath")]
    triggerlist: Option<String>,

    /// File listing one trigger name per line
    #[arg(long)]
    triggerpath: Option<PathBuf>,

    /// Golden run/lumi-section JSON
    #[arg(long)]
    golden_json: Option<PathBuf>,

    /// Selection to apply (dijet, zjet, egamma, multijet)
    #[arg(long, required_unless_present = "config")]
    dataset: Option<Dataset>,

    /// Run range "<first>,<last>", used for output naming
    #[arg(long, conflicts_with = "is_mc")]
    run_range: Option<RunRange>,

    /// Monte-Carlo input
    #[arg(long)]
    is_mc: bool,

    /// Read partitions from the local filesystem
    #[arg(long)]
    is_local: bool,

    /// Remote redirector prefix
    #[arg(long)]
    redirector: Option<String>,

    /// Threads (0 = auto)
    #[arg(long)]
    threads: Option<usize>,

    /// Events per parallel chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Tag appended to the output directory name
    #[arg(long)]
    run_tag: Option<String>,

    /// Parent directory of the skim output
    #[arg(long, required_unless_present = "config")]
    out: Option<PathBuf>,

    /// Also write the run summary (pretty JSON) to this file
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries only the output directory
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Skim(args) => cmd_skim(args),
        Commands::Version => {
            println!("j4p {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn cmd_skim(args: SkimArgs) -> Result<()> {
    let cfg = build_config(&args)?;
    tracing::info!(
        dataset = %cfg.dataset,
        files = cfg.files.len(),
        triggers = cfg.triggers.len(),
        out = %cfg.output_dir().display(),
        "starting skim"
    );

    let summary = run_skim(&cfg).context("skim failed")?;

    if let Some(path) = &args.summary {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    println!("{}", summary.output_dir.display());
    Ok(())
}

/// Merge the config file (if any) with the command-line flags; flags win.
fn build_config(args: &SkimArgs) -> Result<SkimConfig> {
    let mut cfg = match (&args.config, args.dataset) {
        (Some(path), dataset) => {
            let mut cfg = read_skim_config(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            if let Some(d) = dataset {
                cfg.dataset = d;
            }
            cfg
        }
        (None, Some(dataset)) => SkimConfig::new(Vec::new(), dataset),
        (None, None) => anyhow::bail!("--dataset is required without --config"),
    };

    // a list flag replaces whichever form (inline or file) the config used
    if let Some(list) = &args.filelist {
        cfg.files = split_inline_list(list);
        cfg.filepath = None;
    }
    if let Some(path) = &args.filepath {
        cfg.files.clear();
        cfg.filepath = Some(path.clone());
    }
    if let Some(list) = &args.triggerlist {
        cfg.triggers = split_inline_list(list);
        cfg.triggerpath = None;
    }
    if let Some(path) = &args.triggerpath {
        cfg.triggers.clear();
        cfg.triggerpath = Some(path.clone());
    }
    if let Some(path) = &args.golden_json {
        cfg.golden_json = Some(path.clone());
    }
    if args.run_range.is_some() {
        cfg.run_range = args.run_range;
    }
    cfg.is_mc |= args.is_mc;
    cfg.is_local |= args.is_local;
    if let Some(r) = &args.redirector {
        cfg.redirector = r.clone();
    }
    if let Some(n) = args.threads {
        cfg.threads = n;
    }
    if let Some(n) = args.chunk_size {
        cfg.chunk_size = n;
    }
    if let Some(tag) = &args.run_tag {
        cfg.run_tag = tag.clone();
    }
    if let Some(out) = &args.out {
        cfg.out_dir = out.clone();
    }

    cfg.resolve_lists()?;
    Ok(cfg)
}
