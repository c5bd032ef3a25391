use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};

use wsa_fulfillment::app::ports::ExistingIdSource;
use wsa_fulfillment::app::process_use_case::{ProcessOutcome, ProcessRequest, ProcessUseCase};
use wsa_fulfillment::config::AppConfig;
use wsa_fulfillment::infra::{ExportFormat, Exporter, FileIdSource, SheetsIdSource};
use wsa_fulfillment::logging;
use wsa_fulfillment::observability;
use wsa_fulfillment::pipeline::ingestion::{read_path, IdLedger};
use wsa_fulfillment::{
    DataAnalyzer, DataProcessor, DataQualityChecker, MetricsCalculator, Mode, QualityReport,
    ReportGenerator,
};

const DEFAULT_LEDGER_PATH: &str = "data/wsa_ledger.db";
const MAX_LISTED_ROW_ERRORS: usize = 20;

#[derive(Parser)]
#[command(name = "wsa_fulfillment")]
#[command(about = "Clean, deduplicate and report on telecom fulfillment order exports")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $WSA_CONFIG, then wsa.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serve Prometheus metrics on this port
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cleaning pipeline and write the exports
    Process {
        #[arg(long)]
        input: PathBuf,
        /// WSA, MODOROSO or WAPPR
        #[arg(long, value_parser = parse_mode)]
        mode: Mode,
        /// Months to keep, comma-separated (e.g. 1,2)
        #[arg(long, value_delimiter = ',')]
        months: Vec<u32>,
        /// Where known ids come from: sheets, ledger or file:PATH
        #[arg(long)]
        ids_from: Option<String>,
        /// SQLite id ledger location
        #[arg(long, default_value = DEFAULT_LEDGER_PATH)]
        ledger: PathBuf,
        /// Process in chunks of this many rows
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long, default_value = "output")]
        out_dir: PathBuf,
        #[arg(long, value_delimiter = ',', default_value = "xlsx,csv,json", value_parser = parse_format)]
        formats: Vec<ExportFormat>,
        /// Add the exported ids to the ledger
        #[arg(long)]
        record_ledger: bool,
    },
    /// Score a file and print the detailed quality report
    Quality {
        #[arg(long)]
        input: PathBuf,
        /// Write the auto-fixed records here (.xlsx, .csv or .json)
        #[arg(long)]
        fix: Option<PathBuf>,
    },
    /// Print an analytics report
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Html,
}

fn parse_mode(s: &str) -> std::result::Result<Mode, String> {
    s.parse().map_err(|e: wsa_fulfillment::WsaError| e.to_string())
}

fn parse_format(s: &str) -> std::result::Result<ExportFormat, String> {
    s.parse().map_err(|e: wsa_fulfillment::WsaError| e.to_string())
}

enum IdsFrom {
    Sheets,
    Ledger,
    File(PathBuf),
}

impl IdsFrom {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "sheets" => Ok(IdsFrom::Sheets),
            "ledger" => Ok(IdsFrom::Ledger),
            other => match other.strip_prefix("file:") {
                Some(path) if !path.is_empty() => Ok(IdsFrom::File(PathBuf::from(path))),
                _ => bail!("--ids-from must be sheets, ledger or file:PATH, got '{}'", other),
            },
        }
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::load()?,
    };
    let _log_guard = logging::init_logging(&config.logging)?;

    if let Some(port) = cli.metrics_port {
        observability::init_exporter(port)?;
        info!("Prometheus metrics on port {}", port);
    }

    match cli.command {
        Commands::Process {
            input,
            mode,
            months,
            ids_from,
            ledger,
            batch_size,
            sort_by,
            out_dir,
            formats,
            record_ledger,
        } => {
            let ids_from = ids_from.as_deref().map(IdsFrom::parse).transpose()?;
            let args = ProcessArgs {
                input,
                mode,
                months,
                ids_from,
                ledger,
                batch_size,
                sort_by,
                out_dir,
                formats,
                record_ledger,
            };
            run_process(&config, args)?;
        }
        Commands::Quality { input, fix } => run_quality(&config, &input, fix.as_deref())?,
        Commands::Analyze {
            input,
            format,
            top,
            output,
        } => run_analyze(&config, &input, format, top, output.as_deref())?,
    }
    Ok(())
}

struct ProcessArgs {
    input: PathBuf,
    mode: Mode,
    months: Vec<u32>,
    ids_from: Option<IdsFrom>,
    ledger: PathBuf,
    batch_size: Option<usize>,
    sort_by: Option<String>,
    out_dir: PathBuf,
    formats: Vec<ExportFormat>,
    record_ledger: bool,
}

fn run_process(config: &AppConfig, args: ProcessArgs) -> Result<()> {
    println!("🔄 Processing {} in {} mode...", args.input.display(), args.mode);
    let raw = read_path(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let processor = DataProcessor::new(config.processor_config(args.mode)?);
    let dedupe_column = processor.config().dedupe_column.clone();

    // Large inputs go through the chunked runner even without --batch-size
    let batch_size = args
        .batch_size
        .or_else(|| (raw.len() > config.batch.batch_size).then_some(config.batch.batch_size));
    let request = ProcessRequest {
        months: args.months,
        batch_size,
        sort_by: args.sort_by,
    };

    let needs_ledger = args.record_ledger || matches!(args.ids_from, Some(IdsFrom::Ledger));
    let mut ledger = if needs_ledger {
        Some(IdLedger::open(&args.ledger)?)
    } else {
        None
    };

    let started = Instant::now();
    let outcome = {
        let source: Option<Box<dyn ExistingIdSource + '_>> = match &args.ids_from {
            None => None,
            Some(IdsFrom::Sheets) => {
                let id_column = config
                    .sheets
                    .id_column
                    .clone()
                    .or_else(|| Some(dedupe_column.clone()));
                Some(Box::new(SheetsIdSource::from_env(&config.sheets, args.mode, id_column)?))
            }
            Some(IdsFrom::File(path)) => {
                Some(Box::new(FileIdSource::new(path.clone(), Some(dedupe_column.clone()))))
            }
            Some(IdsFrom::Ledger) => match &ledger {
                Some(ledger) => Some(Box::new(ledger.for_mode(args.mode))),
                None => bail!("id ledger was not opened"),
            },
        };

        let mut use_case = ProcessUseCase::new(processor, config.quality_config());
        if let Some(source) = source.as_deref() {
            use_case = use_case.with_id_source(source);
        }
        use_case.execute(raw, &request)?
    };
    let elapsed = started.elapsed().as_secs_f64();

    print_outcome(&outcome, elapsed);

    if outcome.records.is_empty() {
        warn!("No rows left after processing, skipping export");
        println!("⚠️  No rows left after processing; nothing exported");
    } else {
        let exporter = Exporter::new(config.export.clone());
        let today = chrono::Local::now().date_naive();
        let written = exporter.write_all(&outcome.records, &args.formats, &args.out_dir, today)?;
        println!("\n💾 Exports:");
        for path in &written {
            println!("   {}", path.display());
        }
    }

    if args.record_ledger {
        if let Some(ledger) = ledger.as_mut() {
            let added = ledger.record_ids(args.mode, outcome.ids(&dedupe_column))?;
            println!("\n📒 Ledger: {} new ids recorded", added);
        }
    }

    if !outcome.chunk_errors.is_empty() {
        error!("{} chunks failed", outcome.chunk_errors.len());
        println!("❌ {} chunks failed; output is incomplete", outcome.chunk_errors.len());
    } else {
        println!("\n✅ Processing completed successfully");
    }
    Ok(())
}

fn print_outcome(outcome: &ProcessOutcome, elapsed: f64) {
    let stats = &outcome.stats;
    println!("\n📊 Processing Results:");
    println!("   Raw rows: {}", stats.raw_rows);
    println!("   Dropped (malformed): {}", stats.dropped_malformed);
    println!("   Dropped (mode filter): {}", stats.dropped_by_mode);
    println!("   Dropped (month filter): {}", stats.dropped_by_month);
    println!("   Dropped (duplicates): {}", stats.dropped_duplicates);
    println!("   Final rows: {}", stats.final_rows);
    if let Some(source) = &outcome.id_source {
        println!("   Known ids from {}: {}", source, outcome.existing_ids);
    }

    let rates = MetricsCalculator::from_stats(stats);
    println!(
        "   Retention: {:.2}% (filtered {:.2}%)",
        rates.retention_rate, rates.filter_rate
    );
    if let Some(efficiency) = MetricsCalculator::efficiency_metrics(elapsed, stats.raw_rows) {
        println!(
            "   Time: {} ({:.2} rows/s)",
            efficiency.processing_time_formatted, efficiency.records_per_second
        );
    }

    if !stats.row_errors.is_empty() {
        println!("\n⚠️  Skipped rows:");
        for row_error in stats.row_errors.iter().take(MAX_LISTED_ROW_ERRORS) {
            println!("   - {}", row_error);
        }
        if stats.row_errors.len() > MAX_LISTED_ROW_ERRORS {
            println!(
                "   ... and {} more",
                stats.row_errors.len() - MAX_LISTED_ROW_ERRORS
            );
        }
    }

    if !outcome.chunk_errors.is_empty() {
        println!("\n❌ Failed chunks:");
        for chunk_error in &outcome.chunk_errors {
            println!("   - {}", chunk_error);
        }
    }

    let card = QualityReport::from_result(outcome.quality.clone()).summary_card();
    println!("\n🔍 Data Quality: {}/100 ({})", card.score, card.status);
    println!(
        "   Issues: {} (critical {}, warning {}, info {})",
        card.total_issues, card.critical_issues, card.warning_issues, card.info_issues
    );
    for issue in &card.top_issues {
        println!("   - [{}] {}", issue.severity.as_str(), issue.message);
    }
}

fn run_quality(config: &AppConfig, input: &Path, fix: Option<&Path>) -> Result<()> {
    let records = read_path(input).with_context(|| format!("failed to read {}", input.display()))?;
    let mut checker = DataQualityChecker::with_config(records, config.quality_config());
    let result = checker.run_all_checks().clone();
    println!("{}", QualityReport::from_result(result).detailed_report());

    if let Some(path) = fix {
        let format: ExportFormat = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .parse()?;
        let fixed = checker.fix_common_issues();
        Exporter::new(config.export.clone()).write(&fixed, format, path)?;
        println!(
            "🔧 Wrote {} fixed rows ({} removed) to {}",
            fixed.len(),
            checker.records().len() - fixed.len(),
            path.display()
        );
    }
    Ok(())
}

fn run_analyze(
    config: &AppConfig,
    input: &Path,
    format: ReportFormat,
    top: usize,
    output: Option<&Path>,
) -> Result<()> {
    let records = read_path(input).with_context(|| format!("failed to read {}", input.display()))?;
    let analyzer = DataAnalyzer::with_columns(&records, config.columns.clone());
    let generator = ReportGenerator::new(&analyzer, top);
    let title = wsa_fulfillment::analytics::report::DEFAULT_TITLE;
    let rendered = match format {
        ReportFormat::Markdown => generator.markdown(title),
        ReportFormat::Html => generator.html(title)?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("📝 Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
