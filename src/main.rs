mod artifacts;
mod config;
mod model;
mod pdf;
mod pipeline;
mod sink;
mod validate;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use itertools::Itertools;

use config::Settings;
use pipeline::chapters::ChapterPatternSet;
use pipeline::PipelineOptions;
use sink::{import_records, rest::RestSink, sqlfile::SqlFileSink, sqlite::SqliteSink, ExerciseSink};

#[derive(Parser)]
#[command(name = "mathia-importer", about = "Mathia exercise extraction and import")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract exercises from a textbook PDF into JSON files
    Extract {
        /// Path to the textbook PDF
        #[arg(long)]
        pdf: PathBuf,
        /// Output directory for the JSON artifacts
        #[arg(long, default_value = "extracted")]
        output: PathBuf,
        /// Grade label used for tags and course lookup
        #[arg(long, default_value = "6eme")]
        grade: String,
        /// Keep accented characters instead of folding them to ASCII
        #[arg(long)]
        keep_accents: bool,
        /// Minimum raw block length kept by the segmenter
        #[arg(long, default_value = "20")]
        min_block_len: usize,
        /// Chapter heading patterns: "headed" or "extended"
        #[arg(long, default_value = "extended")]
        chapter_patterns: String,
        /// Print the summary without writing any file
        #[arg(long)]
        no_save: bool,
    },
    /// Convert exercise JSON files into a SQL insertion script
    Convert {
        /// Exercise JSON files or directories of them
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Output SQL file (or anchor directory when splitting)
        #[arg(long, default_value = "mathia_library.sql")]
        output: PathBuf,
        /// Write one part file per chapter plus import instructions
        #[arg(long)]
        split: bool,
        #[arg(long, default_value = "6eme")]
        grade: String,
    },
    /// Import exercise JSON files straight into the local database
    Import {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Database path (defaults to DATABASE_URL or data/mathia.sqlite)
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value = "6eme")]
        grade: String,
    },
    /// Push exercise JSON files to the REST API
    Push {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// API base URL (defaults to SUPABASE_URL)
        #[arg(long)]
        url: Option<String>,
        /// API key (defaults to SUPABASE_ANON_KEY)
        #[arg(long)]
        key: Option<String>,
        #[arg(long, default_value = "6eme")]
        grade: String,
    },
    /// Validate an exercise JSON file and optionally fix common issues
    Validate {
        #[arg(long)]
        file: PathBuf,
        /// Write a corrected copy and re-validate it
        #[arg(long)]
        fix: bool,
        /// Where the corrected copy goes (defaults to <file>_fixed.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show exercise counts from the local database
    Stats {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let settings = Settings::load();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            pdf,
            output,
            grade,
            keep_accents,
            min_block_len,
            chapter_patterns,
            no_save,
        } => cmd_extract(
            &pdf,
            &output,
            grade,
            keep_accents,
            min_block_len,
            &chapter_patterns,
            no_save,
        ),
        Commands::Convert {
            input,
            output,
            split,
            grade,
        } => {
            let records = load_inputs(&input)?;
            let mut sink = SqlFileSink::new(output, split, settings);
            run_sink(&mut sink, &records, &grade)
        }
        Commands::Import { input, db, grade } => {
            let records = load_inputs(&input)?;
            let path = db.unwrap_or_else(|| PathBuf::from(settings.sqlite_path()));
            println!("Database: {}\n", path.display());
            let mut sink = SqliteSink::open(&path)?;
            run_sink(&mut sink, &records, &grade)
        }
        Commands::Push {
            input,
            url,
            key,
            grade,
        } => {
            let records = load_inputs(&input)?;
            let base_url = url
                .or_else(|| settings.supabase_url.clone())
                .ok_or_else(|| anyhow::anyhow!("no API URL: pass --url or set SUPABASE_URL"))?;
            let api_key = key
                .or_else(|| settings.supabase_anon_key.clone())
                .ok_or_else(|| anyhow::anyhow!("no API key: pass --key or set SUPABASE_ANON_KEY"))?;
            let mut sink = RestSink::new(&base_url, &api_key)?;
            sink.wait_until_ready()?;
            run_sink(&mut sink, &records, &grade)
        }
        Commands::Validate { file, fix, output } => cmd_validate(&file, fix, output),
        Commands::Stats { db } => {
            let path = db.unwrap_or_else(|| PathBuf::from(settings.sqlite_path()));
            anyhow::ensure!(path.exists(), "database not found: {}", path.display());
            let conn = sink::sqlite::connect(&path)?;
            let stats = sink::sqlite::get_stats(&conn)?;
            print_db_stats(&stats);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn cmd_extract(
    pdf: &PathBuf,
    output: &PathBuf,
    grade: String,
    keep_accents: bool,
    min_block_len: usize,
    chapter_patterns: &str,
    no_save: bool,
) -> Result<()> {
    anyhow::ensure!(pdf.exists(), "PDF not found: {}", pdf.display());

    println!("Mathia exercise extraction");
    println!("==========================\n");

    let opts = PipelineOptions {
        clean_accents: !keep_accents,
        chapter_patterns: chapter_patterns.parse::<ChapterPatternSet>()?,
        min_block_len,
        grade,
    };

    println!("Extracting text from {}...", pdf.display());
    let document = pdf::extract(pdf)?;
    println!("  {} pages, {} characters\n", document.pages, document.text.len());

    let extraction = pipeline::run(&document.text, &opts);

    println!("{} chapters identified:", extraction.per_chapter.len());
    for entry in &extraction.per_chapter {
        println!(
            "  {}. {}: {} exercises",
            entry.chapter.number,
            entry.chapter.title,
            entry.records.len()
        );
    }

    let by_type = extraction
        .all_records()
        .map(|r| r.kind.as_str())
        .counts()
        .into_iter()
        .sorted_by_key(|(_, n)| std::cmp::Reverse(*n))
        .collect::<Vec<_>>();
    println!("\n{} exercises extracted", extraction.total_records());
    for (kind, count) in by_type {
        println!("  {}: {}", kind, count);
    }
    if extraction.duplicates_dropped > 0 {
        println!("  duplicates dropped: {}", extraction.duplicates_dropped);
    }

    if !no_save {
        let summary = artifacts::save_extraction(output, &opts.grade, &extraction)?;
        println!(
            "\nSaved {} exercise files to {}",
            summary.exercises_by_chapter.values().filter(|n| **n > 0).count(),
            output.display()
        );
    }
    Ok(())
}

fn load_inputs(inputs: &[PathBuf]) -> Result<Vec<model::ExerciseRecord>> {
    let files = artifacts::resolve_inputs(inputs)?;
    println!("Loading {} exercise file(s)...", files.len());
    artifacts::load_all(&files)
}

fn run_sink(sink: &mut dyn ExerciseSink, records: &[model::ExerciseRecord], grade: &str) -> Result<()> {
    println!("Sink: {}\n", sink.name());
    let summary = import_records(sink, records, grade)?;
    summary.print();
    Ok(())
}

fn cmd_validate(file: &PathBuf, fix: bool, output: Option<PathBuf>) -> Result<()> {
    let records = artifacts::load_exercises(file)?;
    println!("Loaded {} exercises from {}\n", records.len(), file.display());

    let report = validate::validate_all(&records);
    println!("{}", validate::render_report(&report));

    if fix {
        let fixed = validate::fix_common_issues(records);
        let target = output.unwrap_or_else(|| {
            let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("exercises");
            file.with_file_name(format!("{}_fixed.json", stem))
        });
        std::fs::write(&target, serde_json::to_string_pretty(&fixed)?)?;
        println!("Corrected copy written to {}\n", target.display());

        let fixed_report = validate::validate_all(&fixed);
        println!("{}", validate::render_report(&fixed_report));
    }
    Ok(())
}

fn print_db_stats(stats: &sink::sqlite::DbStats) {
    println!("Courses:   {}", stats.courses);
    println!("Exercises: {}", stats.exercises);

    println!("\nBy type:");
    for (label, count) in &stats.by_type {
        println!("  {:<12} {}", label, count);
    }
    println!("\nBy difficulty:");
    for (label, count) in &stats.by_difficulty {
        println!("  {:<12} {}", label, count);
    }
    println!("\nBy course:");
    for (label, count) in &stats.by_course {
        println!("  {:<40} {}", label, count);
    }
}
