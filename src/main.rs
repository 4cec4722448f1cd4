//! Command-line front end: analyze single frames, aggregate reports and
//! capture expected-state templates. All logic lives in the library; this
//! file only parses arguments and prints results.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use framecheck::compare::{ExpectedGameState, StateComparator};
use framecheck::config::PipelineConfig;
use framecheck::frame::Frame;
use framecheck::objects::ObjectDetector;
use framecheck::pipeline::Pipeline;
use framecheck::text::TextRecognizer;
use framecheck::visual::VisualAnalyzer;

#[derive(Parser)]
#[command(name = "framecheck", version, about = "Visual verification for game screenshots")]
struct Cli {
    /// Path to a JSON config file; defaults apply if missing
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output directory for analyses and reports
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline on one screenshot and print the findings
    Analyze {
        /// Screenshot to analyze
        image: PathBuf,
        /// Expected-state template JSON to validate against
        #[arg(long)]
        expected: Option<PathBuf>,
    },
    /// Aggregate all stored analyses into a report
    Report,
    /// Capture an expected-state template from a known-good screenshot
    Template {
        /// Known-good screenshot
        image: PathBuf,
        /// Write the template here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path),
        None => PipelineConfig::default(),
    };
    if let Some(out_dir) = &cli.out_dir {
        config.store.out_dir = out_dir.clone();
    }
    config.validate()?;

    match cli.command {
        Command::Analyze { image, expected } => analyze(config, &image, expected.as_deref()),
        Command::Report => report(config),
        Command::Template { image, out } => template(config, &image, out.as_deref()),
    }
}

fn analyze(
    config: PipelineConfig,
    image: &std::path::Path,
    expected: Option<&std::path::Path>,
) -> Result<()> {
    let frame = Frame::from_path(image)?;
    let expected_state = expected
        .map(|path| -> Result<ExpectedGameState> {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        })
        .transpose()?;

    let mut pipeline = Pipeline::new(config)?;
    let analysis = pipeline.process_frame(&frame, expected_state.as_ref());

    println!("Frame {} ({:.1} ms)", analysis.frame_id, analysis.processing_ms);
    println!(
        "  UI elements: {}, text elements: {}, objects: {}",
        analysis.visual.ui_elements.len(),
        analysis.text.text_elements.len(),
        analysis.objects.detected_objects.len()
    );
    if let Some(state) = &analysis.state {
        println!(
            "  State: {} ({} critical, {} warnings)",
            if state.is_valid { "VALID" } else { "INVALID" },
            state.critical_issues,
            state.warnings
        );
    }
    if analysis.classified_issues.is_empty() {
        println!("  No issues.");
    } else {
        println!("  Issues:");
        for issue in &analysis.classified_issues {
            println!(
                "    [{}] {} at ({}, {}): {}",
                issue.severity,
                issue.issue_type,
                issue.location.0,
                issue.location.1,
                issue.description
            );
        }
    }
    for rec in &analysis.summary.recommendations {
        println!("  > {}", rec);
    }
    Ok(())
}

fn report(config: PipelineConfig) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let report = pipeline.generate_report(None)?;

    println!("Report {}", report.report_id);
    println!(
        "  Frames: {} total, {} failed, {} valid",
        report.total_frames, report.failed_frames, report.valid_frames
    );
    println!(
        "  Issues: {} total, {} critical",
        report.total_issues, report.critical_total
    );
    let mut severities: Vec<_> = report.issues_by_severity.iter().collect();
    severities.sort();
    for (severity, count) in severities {
        println!("    {}: {}", severity, count);
    }
    for rec in &report.recommendations {
        println!("  > {}", rec);
    }
    Ok(())
}

fn template(
    config: PipelineConfig,
    image: &std::path::Path,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let frame = Frame::from_path(image)?;

    let mut visual = VisualAnalyzer::new(config.visual.clone(), config.preprocess.clone());
    let text = TextRecognizer::new(config.text.clone(), config.preprocess.clone());
    let mut objects = ObjectDetector::new(config.objects.clone(), None);
    let comparator = StateComparator::new(config.compare.clone());

    let visual_analysis = visual.analyze(&frame);
    let text_analysis = text.recognize(&frame);
    let object_analysis = objects.detect(&frame);

    let template = comparator.create_template(
        &visual_analysis.ui_elements,
        &text_analysis.text_elements,
        &object_analysis.detected_objects,
    );
    let json = serde_json::to_string_pretty(&template)?;

    match out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Template written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
