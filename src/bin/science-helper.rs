//! CLI binary for science-helper.
//!
//! A thin shim over the library crate: `compose` maps flags to a
//! `CompositionConfig`, the catalog subcommands map flags and an optional
//! settings file to a `CatalogConfig`.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use science_helper::figure::font::is_font_file;
use science_helper::vak::filter::{csv_bytes, export_rows};
use science_helper::{
    catalog, compose_to_file, AxisSpec, CatalogConfig, CodeMatch, Color, CompositionConfig, Corner,
    ExportFormat, FilterOptions, FontSpec, ImageElement, LabelScheme, LabelStyle, LayoutMode,
    LayoutPolicy, Resource, RetrievalProgressCallback, WhitelistMode,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner for catalog downloads. Catalog and whitelist are
/// fetched concurrently, so events arrive interleaved; each one is printed
/// above the spinner as its own line.
struct CliRetrievalProgress {
    bar: ProgressBar,
    in_flight: AtomicUsize,
}

impl CliRetrievalProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Fetching");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            in_flight: AtomicUsize::new(0),
        })
    }

    fn finish_one(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) <= 1 {
            self.bar.finish_and_clear();
        }
    }
}

impl RetrievalProgressCallback for CliRetrievalProgress {
    fn on_fetch_start(&self, resource: Resource, url: &str) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.bar.set_message(format!("{resource}"));
        self.bar.println(format!("{} {} {}", cyan("◆"), bold(&resource.to_string()), dim(url)));
    }

    fn on_retry(&self, resource: Resource, attempt: u32, max_attempts: u32, error: &str) {
        self.bar.println(format!(
            "  {} {} attempt {}/{} failed: {}",
            cyan("⚠"),
            resource,
            attempt,
            max_attempts,
            dim(error)
        ));
    }

    fn on_fetch_complete(&self, resource: Resource, bytes: usize) {
        self.bar.println(format!(
            "  {} {} {}",
            green("✓"),
            resource,
            dim(&format!("{} KiB", bytes.div_ceil(1024)))
        ));
        self.finish_one();
    }

    fn on_fetch_error(&self, resource: Resource, error: &str) {
        // Keep long errors on one tidy line.
        let msg: String = if error.chars().count() > 100 {
            error.chars().take(99).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {} {}", red("✗"), resource, red(&msg)));
        self.finish_one();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Four panels in a 2x2 grid, labelled A-D, as PNG
  science-helper compose a.png b.png c.png d.png --layout grid --labels latin-upper -o fig.png

  # Every image of a directory in a row, Roman labels, editable draw.io output
  science-helper compose panels/ --labels roman -o fig.drawio

  # Axes with Cyrillic tick labels
  science-helper compose plot.png --axes --tick-labels cyrillic-lower -o plot_axes.png

  # Refresh the catalog, whitelist and nomenclature caches
  science-helper --settings settings.json fetch

  # Parse the cached catalog into records JSON
  science-helper --settings settings.json parse

  # Journals for two specialties that are on the whitelist, as CSV
  science-helper --settings settings.json filter --codes 2.3.1,2.3.5 -o journals.csv

  # Whole specialty group, whitelist ignored
  science-helper filter --codes 2.3 --match prefix --ignore-whitelist

  # Every whitelisted journal, any specialty
  science-helper filter --codes all -o whitelisted.csv

  # Specialties of a group
  science-helper nomenclature --group 2.3

LABEL SCHEMES:
  latin-upper (A, B, …)   latin-lower (a, b, …)   cyrillic-upper (А, Б, …)
  cyrillic-lower (а, б, …)   arabic (1, 2, …)   roman (I, II, …)   custom:x,y,z

SETTINGS FILE (JSON, every key optional):
  {"regex": {"re_row_start": "…", "re_issn_raw": "…", "re_date": "…", "re_spec_code": "…"},
   "web": {"vak_list_url": "…", "white_list_url": "…", "spec_url": "…"},
   "directories": {"main_dir": ".", "data_dir": "data", "file_name": "vak_list.pdf"},
   "retrieval": {"max_attempts": 3, "retry_backoff_ms": 500, "download_timeout_secs": 60}}

ENVIRONMENT VARIABLES:
  SCIENCE_HELPER_SETTINGS  Settings file (same as --settings)
  PDFIUM_LIB_PATH          pdfium shared library (or its directory) for catalog parsing
  RUST_LOG                 Log filter, overrides --verbose / --quiet
"#;

/// Compose labelled scientific figures and filter VAK journal catalogs.
#[derive(Parser, Debug)]
#[command(
    name = "science-helper",
    version,
    about = "Compose labelled scientific figures and filter VAK journal catalogs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON settings file for the catalog commands.
    #[arg(long, global = true, env = "SCIENCE_HELPER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Override the cache data directory.
    #[arg(long, global = true, env = "SCIENCE_HELPER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SCIENCE_HELPER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SCIENCE_HELPER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out images, number them, optionally draw axes, and export.
    Compose(ComposeArgs),
    /// Download the catalog, whitelist and nomenclature into the cache.
    Fetch(FetchArgs),
    /// Parse the cached catalog PDF into journal records.
    Parse(ParseArgs),
    /// Filter journals by specialty codes and whitelist membership.
    Filter(FilterArgs),
    /// List specialties from the cached nomenclature.
    Nomenclature(NomenclatureArgs),
}

#[derive(Args, Debug)]
struct ComposeArgs {
    /// Image files (png, jpg, jpeg) or directories of images.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file; the format follows the extension (.png, .drawio, .xml).
    #[arg(short, long)]
    output: PathBuf,

    /// Force the output format regardless of extension.
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Layout: row, column or grid.
    #[arg(long, default_value = "row")]
    layout: LayoutMode,

    /// Grid rows (derived when omitted).
    #[arg(long, value_parser = clap::value_parser!(usize))]
    rows: Option<usize>,

    /// Grid columns (derived when omitted).
    #[arg(long, value_parser = clap::value_parser!(usize))]
    columns: Option<usize>,

    /// Gap between images and around the edge, in pixels.
    #[arg(long, default_value_t = 10)]
    padding: u32,

    /// Border width around each image, in pixels.
    #[arg(long, default_value_t = 0)]
    border: u32,

    /// Border color (#rrggbb or a name).
    #[arg(long, default_value = "black")]
    border_color: Color,

    /// Canvas background color.
    #[arg(long, default_value = "white")]
    background: Color,

    /// Label scheme; labels are drawn only when this is given.
    #[arg(long)]
    labels: Option<LabelScheme>,

    /// Label corner: top-left, top-right, bottom-left, bottom-right.
    #[arg(long, default_value = "top-left")]
    corner: Corner,

    /// Label box edge, in pixels.
    #[arg(long, default_value_t = 40)]
    label_size: u32,

    /// Gap between the label box and the image edge.
    #[arg(long, default_value_t = 0)]
    label_offset: u32,

    /// Label box fill.
    #[arg(long, default_value = "white")]
    label_background: Color,

    /// Label text color.
    #[arg(long, default_value = "black")]
    label_color: Color,

    /// Label font size in pixels.
    #[arg(long, default_value_t = 24.0)]
    label_font_px: f32,

    /// TrueType/OpenType font for labels and axes (built-in font otherwise).
    #[arg(long, env = "SCIENCE_HELPER_FONT")]
    font: Option<PathBuf>,

    /// Draw axes on every image.
    #[arg(long)]
    axes: bool,

    /// Ticks per axis.
    #[arg(long, default_value_t = 5)]
    ticks: usize,

    /// Tick label scheme.
    #[arg(long, default_value = "arabic")]
    tick_labels: LabelScheme,

    /// Inset of the axis origin from the bottom-left corner.
    #[arg(long, default_value_t = 20)]
    axis_origin_offset: u32,

    #[arg(long, default_value = "X")]
    x_title: String,

    #[arg(long, default_value = "Y")]
    y_title: String,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Fetch only this resource.
    #[arg(long, value_enum)]
    only: Option<ResourceArg>,

    /// Catalog PDF URL.
    #[arg(long, env = "SCIENCE_HELPER_CATALOG_URL")]
    catalog_url: Option<String>,

    /// Whitelist JSON URL.
    #[arg(long, env = "SCIENCE_HELPER_WHITELIST_URL")]
    whitelist_url: Option<String>,

    /// Nomenclature HTML URL.
    #[arg(long, env = "SCIENCE_HELPER_NOMENCLATURE_URL")]
    nomenclature_url: Option<String>,

    /// Attempts per resource.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Parse this PDF instead of the cached catalog.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Records JSON output (defaults to the cache records file).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// pdfium shared library or its directory.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// List every skipped block.
    #[arg(long)]
    show_skipped: bool,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Specialty codes, comma separated (e.g. 2.3.1,2.3.5), or `all`.
    #[arg(long, required = true, value_delimiter = ',')]
    codes: Vec<String>,

    /// Keep journals regardless of whitelist membership.
    #[arg(long)]
    ignore_whitelist: bool,

    /// Code comparison: exact, or prefix (2.3 matches 2.3.1).
    #[arg(long = "match", default_value = "exact")]
    code_match: CodeMatch,

    /// CSV output file (stdout otherwise).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// pdfium shared library or its directory, for a catalog that still needs parsing.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct NomenclatureArgs {
    /// Only specialties under this group code (e.g. 2.3).
    #[arg(long)]
    group: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ResourceArg {
    Catalog,
    Whitelist,
    Nomenclature,
}

impl From<ResourceArg> for Resource {
    fn from(v: ResourceArg) -> Self {
        match v {
            ResourceArg::Catalog => Resource::Catalog,
            ResourceArg::Whitelist => Resource::Whitelist,
            ResourceArg::Nomenclature => Resource::Nomenclature,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Compose(args) => run_compose(&cli, args),
        Command::Fetch(args) => run_fetch(&cli, args).await,
        Command::Parse(args) => run_parse(&cli, args).await,
        Command::Filter(args) => run_filter(&cli, args).await,
        Command::Nomenclature(args) => run_nomenclature(&cli, args),
    }
}

// ── compose ──────────────────────────────────────────────────────────────

fn run_compose(cli: &Cli, args: &ComposeArgs) -> Result<()> {
    let start = Instant::now();

    let mut images = Vec::new();
    for input in &args.inputs {
        if input.is_dir() {
            let found = ImageElement::load_dir(input)
                .with_context(|| format!("Failed to read images from {}", input.display()))?;
            if found.is_empty() {
                bail!("No png/jpg/jpeg images in {}", input.display());
            }
            images.extend(found);
        } else {
            images.push(
                ImageElement::from_path(input)
                    .with_context(|| format!("Failed to load {}", input.display()))?,
            );
        }
    }

    let config = build_composition_config(args)?;
    let count = images.len();
    let doc = compose_to_file(images, &config, &args.output, args.format)
        .context("Composition failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} images  {}x{} px  {}ms  →  {}",
            green("✔"),
            count,
            doc.width(),
            doc.height(),
            start.elapsed().as_millis(),
            bold(&args.output.display().to_string()),
        );
    }
    Ok(())
}

/// Map compose flags to `CompositionConfig`.
fn build_composition_config(args: &ComposeArgs) -> Result<CompositionConfig> {
    let layout = LayoutPolicy {
        mode: args.layout,
        rows: args.rows,
        columns: args.columns,
        padding: args.padding,
        background: args.background,
        border: args.border,
        border_color: args.border_color,
    };
    let mut builder = CompositionConfig::builder().layout(layout);

    if let Some(scheme) = &args.labels {
        builder = builder.labels(LabelStyle {
            scheme: scheme.clone(),
            corner: args.corner,
            offset: args.label_offset,
            box_width: args.label_size,
            box_height: args.label_size,
            box_color: args.label_background,
            text_color: args.label_color,
            font_px: args.label_font_px,
        });
    }
    if args.axes {
        builder = builder.axes(AxisSpec {
            ticks: args.ticks,
            origin_offset: args.axis_origin_offset,
            tick_labels: args.tick_labels.clone(),
            x_title: args.x_title.clone(),
            y_title: args.y_title.clone(),
            ..Default::default()
        });
    }
    if let Some(font) = &args.font {
        if !is_font_file(font) {
            bail!("--font must point to a .ttf or .otf file (got {})", font.display());
        }
        builder = builder.font(FontSpec::from_path(font));
    }

    builder.build().context("Invalid composition options")
}

// ── catalog commands ─────────────────────────────────────────────────────

/// Settings file (or defaults) plus the global overrides.
fn load_catalog_config(cli: &Cli) -> Result<CatalogConfig> {
    let mut config = match &cli.settings {
        Some(path) => CatalogConfig::from_settings_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => CatalogConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.cache.main_dir = PathBuf::from(".");
        config.cache.data_dir = dir.clone();
    }
    Ok(config)
}

async fn run_fetch(cli: &Cli, args: &FetchArgs) -> Result<()> {
    let mut config = load_catalog_config(cli)?;
    if let Some(url) = &args.catalog_url {
        config.endpoints.catalog_url = Some(url.clone());
    }
    if let Some(url) = &args.whitelist_url {
        config.endpoints.whitelist_url = Some(url.clone());
    }
    if let Some(url) = &args.nomenclature_url {
        config.endpoints.nomenclature_url = Some(url.clone());
    }
    if let Some(n) = args.max_attempts {
        config.retrieval.max_attempts = n;
    }
    if let Some(secs) = args.timeout {
        config.retrieval.download_timeout_secs = secs;
    }
    if !cli.quiet && !args.no_progress {
        config.progress_callback = Some(CliRetrievalProgress::new() as Arc<dyn RetrievalProgressCallback>);
    }
    config.validate().context("Invalid catalog configuration")?;

    let start = Instant::now();
    let fetched = match args.only {
        Some(resource) => vec![catalog::fetch(&config, resource.into())
            .await
            .context("Fetch failed")?],
        None => {
            let report = catalog::refresh_all(&config).await.context("Fetch failed")?;
            let mut all = vec![report.catalog, report.whitelist];
            all.extend(report.nomenclature);
            all
        }
    };

    if !cli.quiet {
        for f in &fetched {
            eprintln!(
                "{}  {:<13} {}",
                green("✔"),
                f.resource.to_string(),
                bold(&f.path.display().to_string())
            );
        }
        eprintln!("   {}", dim(&format!("{}ms total", start.elapsed().as_millis())));
    }
    Ok(())
}

async fn run_parse(cli: &Cli, args: &ParseArgs) -> Result<()> {
    let mut config = load_catalog_config(cli)?;
    if let Some(lib) = &args.pdfium_lib {
        config.pdfium_lib_path = Some(lib.clone());
    }

    let report = match &args.pdf {
        Some(pdf) => catalog::parse_catalog_file(pdf, &config).await,
        None => catalog::load_catalog(&config).await,
    }
    .context("Catalog parsing failed")?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.cache.records_path());
    catalog::save_records(&report, &output).context("Failed to save records")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} records  →  {}",
            green("✔"),
            bold(&report.records.len().to_string()),
            bold(&output.display().to_string())
        );
        if report.skipped_count() > 0 {
            eprintln!(
                "{}  {} blocks skipped{}",
                cyan("⚠"),
                report.skipped_count(),
                if args.show_skipped { ":" } else { " (use --show-skipped to list)" }
            );
            if args.show_skipped {
                for skip in &report.skipped {
                    eprintln!("   {}", dim(&skip.to_string()));
                }
            }
        }
    }
    Ok(())
}

async fn run_filter(cli: &Cli, args: &FilterArgs) -> Result<()> {
    let mut config = load_catalog_config(cli)?;
    if let Some(lib) = &args.pdfium_lib {
        config.pdfium_lib_path = Some(lib.clone());
    }
    let options = FilterOptions {
        whitelist_mode: if args.ignore_whitelist {
            WhitelistMode::Ignore
        } else {
            WhitelistMode::Require
        },
        code_match: args.code_match,
    };

    let result = match &args.output {
        Some(path) => catalog::run_filter_to_csv(&config, args.codes.as_slice(), &options, path)
            .await
            .context("Filtering failed")?,
        None => {
            let result = catalog::run_filter(&config, args.codes.as_slice(), &options)
                .await
                .context("Filtering failed")?;
            let whitelist = catalog::load_whitelist(&config).unwrap_or_default();
            let bytes = csv_bytes(&export_rows(&result, &whitelist))?;
            io::stdout()
                .lock()
                .write_all(&bytes)
                .context("Failed to write to stdout")?;
            result
        }
    };

    if !cli.quiet {
        eprintln!(
            "{}  {} journals  {}",
            if result.records.is_empty() { cyan("⚠") } else { green("✔") },
            bold(&result.records.len().to_string()),
            dim(&format!(
                "({} specialty mismatch, {} not in whitelist, {} blocks skipped)",
                result.specialty_mismatch, result.not_in_whitelist, result.skipped_blocks
            )),
        );
        if let Some(path) = &args.output {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
    }
    Ok(())
}

fn run_nomenclature(cli: &Cli, args: &NomenclatureArgs) -> Result<()> {
    let config = load_catalog_config(cli)?;
    let nomenclature = catalog::load_nomenclature(&config).context("Failed to load nomenclature")?;

    let entries = match &args.group {
        Some(group) => nomenclature.codes_for_group(group),
        None => nomenclature.entries().iter().collect(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let json = serde_json::to_string_pretty(&entries).context("Failed to serialise entries")?;
        writeln!(out, "{json}")?;
    } else {
        let mut current: Option<&str> = None;
        for e in &entries {
            let group = e.subcategory.as_deref().or(e.category.as_deref());
            if group != current {
                if let Some(g) = group {
                    writeln!(out, "{}", bold(g))?;
                }
                current = group;
            }
            writeln!(out, "  {:<10} {}", e.code, e.title)?;
        }
    }
    if entries.is_empty() && !cli.quiet {
        eprintln!("{}  no matching specialties", cyan("⚠"));
    }
    Ok(())
}
