//! texsnap - render the equations in a mixed text/LaTeX file to PNG.
//!
//! # Usage
//!
//! ```bash
//! texsnap notes.txt
//! texsnap --theme dark --scale 2 --out eqs notes.txt
//! texsnap --engine ./node_modules/.bin/tex2svg --error-mode error notes.txt
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use texsnap::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use texsnap::document::{Block, SpanDisplay};
use texsnap::engine::CommandEngine;
use texsnap::image::ColorScheme;
use texsnap::perf;
use texsnap::render::{ErrorDisplayMode, Renderer};

/// Segment mixed text/LaTeX and render its equations to PNG files
#[derive(Parser, Debug)]
#[command(name = "texsnap", version, about, long_about = None)]
struct Cli {
    /// Text file containing inline or display equations
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Directory for the rendered PNG files
    #[arg(short, long, value_name = "DIR", default_value = "texsnap-out")]
    out: PathBuf,

    /// Keep literal runs as written instead of splitting them into lines
    #[arg(long)]
    all: bool,

    /// Split literal runs into lines (overrides a saved --all)
    #[arg(long)]
    only_equations: bool,

    /// Decode HTML entities before looking for equations
    #[arg(long)]
    unencode_html: bool,

    /// Pass TeX to the engine without escape processing
    #[arg(long)]
    no_process_escapes: bool,

    /// What to show for equations the engine rejects
    #[arg(long, value_enum)]
    error_mode: Option<ErrorDisplayMode>,

    /// Pixels per ex of the surrounding font
    #[arg(long, value_name = "PX")]
    font_metric: Option<f32>,

    /// Extra scaling on top of the font metric
    #[arg(long)]
    scale: Option<f32>,

    /// Device pixels per logical pixel
    #[arg(long)]
    display_scale: Option<f32>,

    /// Background the equations will be shown on
    #[arg(long, value_enum)]
    theme: Option<ColorScheme>,

    /// MathJax tex2svg-compatible executable
    #[arg(long, value_name = "PATH")]
    engine: Option<PathBuf>,

    /// Enable stage timing output
    #[arg(long)]
    perf: bool,

    /// Write detailed render debug events to a file
    #[arg(long, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn effective_flags(cli: &Cli, raw_args: &[String]) -> Result<ConfigFlags> {
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    Ok(file_flags.union(&cli_flags))
}

fn write_listing(blocks: &[Block], mode: ErrorDisplayMode, out_dir: &Path) -> Result<usize> {
    let mut written = 0;
    for (index, block) in blocks.iter().enumerate() {
        for span in block.spans() {
            let kind = format!("{:?}", span.kind());
            match span.display(mode) {
                SpanDisplay::Text(text) => println!("{index:>4} {kind:<15} {text:?}"),
                SpanDisplay::Empty => println!("{index:>4} {kind:<15} (nothing to show)"),
                SpanDisplay::Image(bitmap) => {
                    written += 1;
                    let path = out_dir.join(format!("eq-{written:03}.png"));
                    bitmap
                        .as_image()
                        .save(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "{index:>4} {kind:<15} {} ({}x{}, baseline {:+.1})",
                        path.display(),
                        bitmap.width(),
                        bitmap.height(),
                        span.baseline_offset(1.0),
                    );
                }
            }
        }
    }
    Ok(written)
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let effective = effective_flags(&cli, &raw_args)?;

    perf::set_enabled(effective.perf);
    let render_debug_log_path = effective
        .render_debug_log
        .clone()
        .or_else(|| std::env::var_os("TEXSNAP_RENDER_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(render_debug_log_path.as_deref()) {
        tracing::warn!(
            path = ?render_debug_log_path,
            %err,
            "failed to initialize render debug log"
        );
    }

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }
    let input = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("Failed to create {}", cli.out.display()))?;

    let options = effective.to_render_options();
    let engine = CommandEngine::new(
        effective
            .engine
            .clone()
            .unwrap_or_else(|| PathBuf::from("tex2svg")),
    );
    let renderer = Renderer::new(Arc::new(engine));

    let blocks = Renderer::parse(&input, &options);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start render runtime")?;
    let rendered = runtime
        .block_on(renderer.render_blocks_async(&blocks, &options))
        .context("Render failed")?;

    let written = write_listing(&rendered, options.error_mode, &cli.out)?;
    tracing::info!(written, out = %cli.out.display(), "render finished");
    Ok(())
}
