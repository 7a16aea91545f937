use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use snafu::{Report, ResultExt, Snafu, Whatever};
use tracing::{error, Level};

use dicom_qa::errors::qa::ensure_dir;
use dicom_qa::errors::QaError;
use dicom_qa::filter::{
    filter_report, FilterError, QualityThresholds, QualityVerdict, DEFAULT_MAX_DISCREPANCY,
    DEFAULT_MIN_SLICES,
};
use dicom_qa::instance::check_instances_with_spinner;
use dicom_qa::report::{
    build_report_with_progress, ReportMode, DEFAULT_INSTANCE_REPORT, DEFAULT_SPACING_REPORT,
};
use dicom_qa::spacing::validate_spacing_with_spinner;
use dicom_qa::table::{TableError, TableFormat};

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Invalid output path: {}", path.display()))]
    InvalidOutputPath { path: PathBuf },

    #[snafu(display("Invalid output format: {}", source))]
    InvalidOutputFormat {
        #[snafu(source(from(TableError, Box::new)))]
        source: Box<TableError>,
    },

    #[snafu(display("QA error: {}", source))]
    Qa {
        #[snafu(source(from(QaError, Box::new)))]
        source: Box<QaError>,
    },

    #[snafu(display("Error writing report {}: {}", path.display(), source))]
    WriteReport {
        path: PathBuf,
        #[snafu(source(from(TableError, Box::new)))]
        source: Box<TableError>,
    },

    #[snafu(display("Error filtering report: {}", source))]
    Filter {
        #[snafu(source(from(FilterError, Box::new)))]
        source: Box<FilterError>,
    },
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the Instance Numbers of a folder match its number of DICOM files.
    /// Prints (number of files, instance number span, span - number of files)
    CheckInstance {
        #[arg(help = "Folder searched recursively for DICOM files")]
        folder: PathBuf,
    },

    /// Build a CSV or Parquet report of instance number checks over subject/session folders.
    /// The instance folder with the most DICOM files in each session is renamed to `new_max`
    BuildInstanceReport {
        #[arg(help = "Root folder laid out as <root>/<subject>/<session>/<instance folder>")]
        root: PathBuf,

        #[arg(
            help = format!("Output filepath, extension determines format: .csv or .parquet (default: {DEFAULT_INSTANCE_REPORT})"),
            short = 'o',
            long = "output",
            value_name = "OUTPUT"
        )]
        output: Option<PathBuf>,
    },

    /// Check that slices in a folder are evenly spaced. Prints 1 if they are, 0 otherwise
    CheckSliceSpacing {
        #[arg(help = "Folder searched recursively for DICOM files")]
        folder: PathBuf,
    },

    /// Build a CSV or Parquet report of slice spacing checks over subject/session folders.
    /// The instance folder with the most DICOM files in each session is renamed to `new_max`
    BuildSpacingReport {
        #[arg(help = "Root folder laid out as <root>/<subject>/<session>/<instance folder>")]
        root: PathBuf,

        #[arg(
            help = format!("Output filepath, extension determines format: .csv or .parquet (default: {DEFAULT_SPACING_REPORT})"),
            short = 'o',
            long = "output",
            value_name = "OUTPUT"
        )]
        output: Option<PathBuf>,
    },

    /// Add a good/bad `auto` column to an instance number report, in place
    FilterReport {
        #[arg(help = "Instance number report", default_value = DEFAULT_INSTANCE_REPORT)]
        report: PathBuf,

        #[arg(
            help = "Sessions with fewer DICOM files than this are bad",
            long = "min-slices",
            default_value_t = DEFAULT_MIN_SLICES
        )]
        min_slices: i64,

        #[arg(
            help = "Sessions whose instance number span exceeds the number of files by more than this are bad",
            long = "max-discrepancy",
            default_value_t = DEFAULT_MAX_DISCREPANCY
        )]
        max_discrepancy: i64,
    },
}

#[derive(Parser, Debug)]
#[command(author = "Scott Chase Waggener", version = env!("CARGO_PKG_VERSION"), about = "Quality checks for DICOM research datasets", long_about = None)]
struct Cli {
    #[arg(
        help = "Increase logging verbosity (-v for info, -vv for debug)",
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

fn main() {
    let cli = Cli::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(log_level(cli.verbose))
            .with_writer(std::io::stderr)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    run(cli.command).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
}

/// Validate the report destination before anything on disk is renamed.
fn resolve_output(output: Option<PathBuf>, default: &str) -> Result<PathBuf, Error> {
    let dest = match output {
        Some(output) if output.is_dir() => InvalidOutputPathSnafu { path: output }.fail(),
        Some(output) => Ok(output),
        None => Ok(PathBuf::from(default)),
    }?;
    TableFormat::from_extension(&dest).context(InvalidOutputFormatSnafu)?;
    Ok(dest)
}

fn build_and_write(root: &Path, dest: &Path, mode: ReportMode) -> Result<(), Error> {
    let summary = build_report_with_progress(root, mode).context(QaSnafu)?;
    summary
        .write(dest)
        .context(WriteReportSnafu { path: dest })?;
    println!(
        "Processed {} sessions ({} failed, {} previously processed). Please review output in file: {}",
        summary.rows.len(),
        summary.num_failed(),
        summary.num_already_processed(),
        dest.display()
    );
    Ok(())
}

fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::CheckInstance { folder } => {
            let folder = ensure_dir(folder).context(QaSnafu)?;
            let result = check_instances_with_spinner(&folder).context(QaSnafu)?;
            println!(
                "({}, {}, {})",
                result.observed_count, result.expected_span, result.discrepancy
            );
        }
        Command::BuildInstanceReport { root, output } => {
            let dest = resolve_output(output, DEFAULT_INSTANCE_REPORT)?;
            build_and_write(&root, &dest, ReportMode::InstanceCheck)?;
        }
        Command::CheckSliceSpacing { folder } => {
            let folder = ensure_dir(folder).context(QaSnafu)?;
            let regular = validate_spacing_with_spinner(&folder).context(QaSnafu)?;
            println!("{}", regular as u8);
        }
        Command::BuildSpacingReport { root, output } => {
            let dest = resolve_output(output, DEFAULT_SPACING_REPORT)?;
            build_and_write(&root, &dest, ReportMode::SlicingCheck)?;
        }
        Command::FilterReport {
            report,
            min_slices,
            max_discrepancy,
        } => {
            let thresholds = QualityThresholds {
                min_slices,
                max_discrepancy,
            };
            let verdicts = filter_report(&report, &thresholds).context(FilterSnafu)?;
            let bad = verdicts
                .iter()
                .filter(|v| **v == QualityVerdict::Bad)
                .count();
            println!(
                "Filtering completed: {} good, {} bad. Review {} for updated output.",
                verdicts.len() - bad,
                bad,
                report.display()
            );
        }
    }
    Ok(())
}
