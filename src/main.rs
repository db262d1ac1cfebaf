use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use log::info;

use susi_analysis::config::AnalysisConfig;
use susi_analysis::data::model::Parameter;
use susi_analysis::data::repository::GroupAssignment;
use susi_analysis::state::{AnalysisState, ComparisonView, SingleFileView};

#[derive(Parser)]
#[command(author, version, about = "Summarise and compare SuSi I-V measurement files")]
struct Args {
    /// Measurement files to load
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Load filter ranges and options from JSON
    #[arg(long)]
    config: Option<PathBuf>,
    /// Separate forward and reverse sweeps in the comparison
    #[arg(long, default_value_t = false)]
    split_directions: bool,
    /// Comma-separated display labels, one per loaded file
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,
    /// JSON list of {label, group, order} assignments
    #[arg(long)]
    groups: Option<PathBuf>,
    /// Print the view as JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    let mut state = AnalysisState::from_config(&config);
    state.split_directions |= args.split_directions;

    state.load_paths(&args.files);
    if let Some(status) = &state.status_message {
        info!("{status}");
    }
    for failure in state.repository.failures() {
        eprintln!("skipped {}: {}", failure.source, failure.error);
    }
    if state.repository.is_empty() {
        bail!("none of the {} input file(s) could be loaded", args.files.len());
    }

    if let Some(labels) = &args.labels {
        state.apply_labels(labels).context("applying --labels")?;
    }
    if let Some(path) = &args.groups {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading group file {}", path.display()))?;
        let assignments: Vec<GroupAssignment> = serde_json::from_str(&text)
            .with_context(|| format!("parsing group file {}", path.display()))?;
        state.apply_grouping(&assignments)?;
    }

    if state.repository.len() == 1 {
        let label = state.repository.labels()[0].to_string();
        let view = state.single_file_view(&label)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            print_single(&view);
        }
    } else {
        let view = state.comparison_view();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            print_comparison(&view);
        }
    }

    Ok(())
}

fn fmt_value(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.3}")
    } else {
        "-".to_string()
    }
}

fn print_single(view: &SingleFileView) {
    println!("{}", view.label);
    if let Some(area) = &view.active_area {
        println!("Active area: {area}");
    }
    println!();
    println!(
        "{:<8} {:<4} {:>10} {:>10} {:>10} {:>10} {:>7}",
        "Pixel", "Dir", "Jsc", "Voc", "Eff", "FF", "Points"
    );
    for pixel in &view.pixels {
        println!(
            "{:<8} {:<4} {:>10} {:>10} {:>10} {:>10} {:>7}",
            pixel.pixel_id,
            pixel.direction.short(),
            fmt_value(pixel.jsc),
            fmt_value(pixel.voc),
            fmt_value(pixel.efficiency),
            fmt_value(pixel.fill_factor),
            pixel.curve.len()
        );
    }
    println!();
    match (&view.best_pixel, &view.summary_error) {
        (Some(best), _) => println!(
            "Best pixel: {} with {} = {}",
            best.display_name(),
            Parameter::Efficiency,
            fmt_value(best.efficiency)
        ),
        (None, Some(err)) => println!("Best pixel: none ({err})"),
        (None, None) => {}
    }
}

fn print_comparison(view: &ComparisonView) {
    for comparison in &view.parameters {
        println!("{}", comparison.parameter);
        println!(
            "  {:<24} {:>5} {:>9} {:>9} {:>9} {:>9} {:>9}  outliers",
            "File", "n", "low", "Q1", "median", "Q3", "high"
        );
        for entry in &comparison.distributions {
            let s = &entry.summary;
            let outliers: Vec<String> = s.outliers.iter().map(|v| fmt_value(*v)).collect();
            println!(
                "  {:<24} {:>5} {:>9} {:>9} {:>9} {:>9} {:>9}  {}{}",
                entry.display_label(),
                s.count,
                fmt_value(s.whisker_low),
                fmt_value(s.q1),
                fmt_value(s.median),
                fmt_value(s.q3),
                fmt_value(s.whisker_high),
                outliers.join(" "),
                if s.is_insufficient() { " (insufficient data)" } else { "" }
            );
        }
        println!();
    }

    println!("Best pixels");
    for best in &view.best_curves {
        println!(
            "  {:<24} Pixel {} ({})  {} %  {} curve points",
            best.label,
            best.pixel_id,
            best.direction,
            fmt_value(best.efficiency),
            best.curve.len()
        );
    }
    if !view.empty_files.is_empty() {
        println!();
        println!("No pixel records: {}", view.empty_files.join(", "));
    }
}
