use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use smartscore::layout::seating::{SeatingTable, Section};
use smartscore::layout::tree::{RandomSource, SeededRandom, SimilarityTreeNode, ThreadRandom, TreeGenerator};
use smartscore::report::{self, AnalysisReport, Summary};
use smartscore::{AnalysisResult, Category, ChartRouter, ChartSpec, EngineConfig, RenderedMetric};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "smartscore")]
#[command(author, version, about = "Turn musical-analysis metrics into chart layouts and flat exports")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Analysis result (.json) or directory of results
    path: Option<PathBuf>,

    /// Output report file (.html, .json, .csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated CSV exports
    #[arg(long, default_value = "smartscore-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate CSV export
    #[arg(long)]
    no_report: bool,

    /// Don't prompt to open report
    #[arg(long)]
    no_open: bool,

    /// Engine config file (JSON); missing keys keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Analysis category, picks the chart style table
    #[arg(long)]
    category: Option<Category>,

    /// Keep only the K heaviest pairs of every pairwise metric
    #[arg(long)]
    top_k: Option<usize>,

    /// Draw pairwise metrics as directed (arrow-headed) ribbons
    #[arg(long)]
    directed: bool,

    /// Seed for similarity tree growth (reproducible trees)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Show per-metric details
    #[arg(short, long)]
    verbose: bool,

    /// Only show summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print chart-ready JSON for one analysis result
    Render {
        /// Analysis result (.json)
        file: PathBuf,

        /// Print the flat export rows instead of charts
        #[arg(long)]
        rows: bool,
    },

    /// Print the orchestra seating table
    Seating {
        /// Only this section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Grow a similarity tree and print its layout as JSON
    Tree {
        /// Root label
        name: String,

        /// Root similarity score in [0, 1]
        similarity: f64,

        /// Maximum depth (default from config)
        #[arg(long)]
        max_depth: Option<u32>,
    },
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(if args.verbose { "debug" } else { "warn" })),
        )
        .with_writer(io::stderr)
        .init();

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid config: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(cmd) = args.command {
        let outcome = match cmd {
            Command::Render { file, rows } => render_file(&file, rows, &config, args.category, args.seed),
            Command::Seating { section } => print_seating(section.as_deref()),
            Command::Tree { name, similarity, max_depth } => {
                print_tree(name, similarity, max_depth, &config, args.seed)
            }
        };
        if let Err(e) = outcome {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let path = if let Some(p) = args.path.clone() {
        p
    } else {
        eprintln!("Usage: smartscore <PATH>");
        eprintln!("Run 'smartscore --help' for more options.");
        std::process::exit(1);
    };

    // Set up thread pool
    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect()
    } else {
        vec![path.clone()]
    };

    if files.is_empty() {
        eprintln!("No analysis results found (expected .json files)");
        std::process::exit(1);
    }

    if !args.quiet {
        eprintln!("\x1b[1mSmartscore - Analysis Chart Mapper\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} result file(s)\n", files.len());
    }

    let pb = if !args.quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let seating = SeatingTable::orchestra();
    let router = ChartRouter::new(&config, &seating).with_category(args.category);

    // Parse and lay out files in parallel
    let outcomes: Vec<(PathBuf, smartscore::Result<AnalysisReport>)> = files
        .par_iter()
        .map(|file| {
            let mut rng = random_source(args.seed);
            let report = load_result(file).map(|result| {
                AnalysisReport::build(&result, &router, rng.as_mut()).with_category(args.category)
            });
            if let Some(ref pb) = pb {
                pb.inc(1);
                pb.set_message(file_label(file));
            }
            (file.clone(), report)
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut reports = Vec::new();
    let mut failures = 0;
    for (file, outcome) in outcomes {
        match outcome {
            Ok(mut report) => {
                if report.source.is_none() {
                    report.source = Some(file_label(&file));
                }
                reports.push(report);
            }
            Err(e) => {
                failures += 1;
                eprintln!("\x1b[31m[ERROR]\x1b[0m {}: {}", file.display(), e);
            }
        }
    }

    if !args.quiet {
        for report in &reports {
            print_report(report, args.verbose);
        }
    }

    let unpositioned: BTreeSet<&str> = reports
        .iter()
        .flat_map(|r| r.charts.iter())
        .flat_map(|c| c.all_unpositioned())
        .collect();
    for name in unpositioned {
        warn!(instrument = name, "instrument has no seat, skipped in spatial charts");
    }

    let summary = Summary::from_reports(&reports);
    if !args.quiet {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  \x1b[32m✓ Charted:\x1b[0m   {}", summary.charted);
        eprintln!("  \x1b[90m∅ No data:\x1b[0m   {}", summary.no_data);
        eprintln!("  \x1b[33m? Raw:\x1b[0m       {}", summary.raw);
        if summary.backend_errors > 0 {
            eprintln!("  \x1b[31m✗ Backend:\x1b[0m   {}", summary.backend_errors);
        }
        eprintln!("  Export rows:  {}", summary.rows);
        if failures > 0 {
            eprintln!("  \x1b[31mUnreadable:\x1b[0m  {}", failures);
        }
    }

    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report && !reports.is_empty() {
        std::fs::create_dir_all(&args.report_dir).ok();
        let filename = match reports.as_slice() {
            [single] => report::export_filename(single.source.as_deref()),
            _ => format!("smartscore_report_{}.csv", Local::now().format("%Y%m%d_%H%M%S")),
        };
        Some(args.report_dir.join(filename))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        if let Err(e) = report::generate(output_path, &reports) {
            eprintln!("Failed to write report: {}", e);
            std::process::exit(1);
        }
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }

        if !args.no_open && !args.quiet {
            eprint!("\nOpen report? [Y/n] ");
            io::stderr().flush().ok();

            let mut input = String::new();
            if io::stdin().read_line(&mut input).is_ok() {
                let input = input.trim().to_lowercase();
                if input.is_empty() || input == "y" || input == "yes" {
                    if let Err(e) = open::that(output_path) {
                        eprintln!("Failed to open report: {}", e);
                    }
                }
            }
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mMapping complete.\x1b[0m");
    }

    if failures > 0 {
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> smartscore::Result<EngineConfig> {
    let mut config = match args.config {
        Some(ref path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(k) = args.top_k {
        config = config.with_top_k(k);
    }
    if args.directed {
        config = config.with_directed(true);
    }
    debug!(?config, "engine config");
    Ok(config)
}

fn load_result(path: &Path) -> smartscore::Result<AnalysisResult> {
    let text = std::fs::read_to_string(path)?;
    AnalysisResult::from_json_str(&text)
}

fn random_source(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(ThreadRandom),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn render_file(
    file: &Path,
    rows: bool,
    config: &EngineConfig,
    category: Option<Category>,
    seed: Option<u64>,
) -> smartscore::Result<()> {
    let result = load_result(file)?;
    let seating = SeatingTable::orchestra();
    let router = ChartRouter::new(config, &seating).with_category(category);
    let mut rng = random_source(seed);

    let json = if rows {
        serde_json::to_string_pretty(&report::flatten::flatten_result(&result))?
    } else {
        serde_json::to_string_pretty(&router.render_result(&result, rng.as_mut()))?
    };
    println!("{}", json);
    Ok(())
}

fn print_seating(section: Option<&str>) -> smartscore::Result<()> {
    let table = SeatingTable::orchestra();
    let wanted = match section {
        Some(name) => Some(
            Section::ALL
                .iter()
                .copied()
                .find(|s| s.to_string().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| smartscore::Error::InvalidInput(format!("unknown section '{}'", name)))?,
        ),
        None => None,
    };

    println!("{:<16} {:>6} {:>6}  {}", "INSTRUMENT", "X", "Y", "SECTION");
    println!("{}", "-".repeat(44));
    for seat in table.iter().filter(|s| wanted.map_or(true, |w| s.section == w)) {
        println!("{:<16} {:>6.2} {:>6.2}  {}", seat.instrument, seat.x, seat.y, seat.section);
    }
    Ok(())
}

fn print_tree(
    name: String,
    similarity: f64,
    max_depth: Option<u32>,
    config: &EngineConfig,
    seed: Option<u64>,
) -> smartscore::Result<()> {
    if !(0.0..=1.0).contains(&similarity) {
        return Err(smartscore::Error::InvalidInput(format!(
            "similarity must be in [0, 1], got {}",
            similarity
        )));
    }
    let config = match max_depth {
        Some(depth) => {
            let config = config.clone().with_tree_max_depth(depth);
            config.validate()?;
            config
        }
        None => config.clone(),
    };
    let layout = TreeGenerator::new(config.tree).generate(&SimilarityTreeNode::root(name, similarity), random_source(seed).as_mut());
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}

fn print_report(report: &AnalysisReport, verbose: bool) {
    eprintln!("\x1b[1m{}\x1b[0m", report.display_name());
    for metric in &report.charts {
        print_metric(metric, 1, verbose);
    }
    if verbose {
        for row in &report.summary {
            eprintln!("    \x1b[90mcard\x1b[0m {} = {}", row.path, row.value);
        }
    }
}

fn print_metric(metric: &RenderedMetric, indent: usize, verbose: bool) {
    let color = match &metric.chart {
        ChartSpec::NoData => "\x1b[90m",
        ChartSpec::Raw { backend_error: true, .. } => "\x1b[31m",
        ChartSpec::Raw { .. } => "\x1b[33m",
        _ => "\x1b[32m",
    };
    let reset = "\x1b[0m";
    let pad = "  ".repeat(indent);

    println!(
        "{}{}{:<16}{} {:<8} {:<40}  {}",
        pad,
        color,
        format!("[{}]", metric.shape),
        reset,
        format!("{:?}", metric.style).to_lowercase(),
        truncate(&metric.path, 40),
        describe(&metric.chart)
    );

    if let ChartSpec::Composite { children } = &metric.chart {
        if verbose {
            for child in children {
                print_metric(child, indent + 1, verbose);
            }
        }
    }
}

fn describe(chart: &ChartSpec) -> String {
    match chart {
        ChartSpec::Scalar { value } => format!("{}", value),
        ChartSpec::Bars { labels, .. } => format!("{} bars", labels.len()),
        ChartSpec::Series { points, .. } => format!("{} units", points.len()),
        ChartSpec::Chord { layout, .. } => format!("{} groups, {} ribbons", layout.groups.len(), layout.ribbons.len()),
        ChartSpec::Network(net) => format!("{} seats, {} links", net.nodes.len(), net.links.len()),
        ChartSpec::Density(map) => format!("{} seats", map.marks.len()),
        ChartSpec::Tree(tree) => format!("{} nodes, depth {}", tree.len(), tree.max_depth()),
        ChartSpec::Composite { children } => format!("{} parts", children.len()),
        ChartSpec::Raw { notice: Some(notice), .. } => truncate(notice, 40),
        ChartSpec::Raw { .. } => "raw".to_string(),
        ChartSpec::NoData => "no data".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
