use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "qualis-reconciliation")]
#[command(about = "Reconcile researcher publication exports against a Qualis reference list and aggregate weighted scores")]
#[command(version = "2.0.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Filter one source against a reference list: accepted table + exclusion log
    Reconcile(ReconcileArgs),

    /// Reconcile one source or a catalog of programs, then score, group and aggregate
    Report(ReportArgs),

    /// Find which catalog programs list a researcher, without reconciling
    Search(SearchArgs),
}

/// How the source file is laid out
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Infer from the file extension
    Auto,
    /// Archive (.zip or .tar.gz) with one CSV per researcher
    Archive,
    /// One consolidated table with a researcher column
    Columnar,
}

impl ModeArg {
    /// Flag understood by `catalog::resolve_mode`
    pub fn as_flag(&self) -> Option<&'static str> {
        match self {
            ModeArg::Auto => None,
            ModeArg::Archive => Some("archive"),
            ModeArg::Columnar => Some("columnar"),
        }
    }
}

#[derive(Parser, Clone)]
pub struct ReconcileArgs {
    /// Qualis reference table (CSV or Parquet) with ISSN and tier columns
    #[arg(short, long, required = true)]
    pub reference: String,

    /// Source: archive of per-researcher CSVs or a consolidated table
    #[arg(short, long, required = true)]
    pub source: String,

    /// Source layout
    #[arg(short, long, value_enum, default_value = "auto")]
    pub mode: ModeArg,

    /// Accepted records output (.parquet or .csv); the exclusion log is written beside it
    #[arg(short, long, default_value = "accepted.parquet")]
    pub output: String,

    /// Directory for cached reconciliation results
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Drop every cached result before running
    #[arg(long)]
    pub clear_cache: bool,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}

#[derive(Parser, Clone)]
pub struct ReportArgs {
    /// Qualis reference table for a single source
    #[arg(short, long, requires = "source", conflicts_with = "catalog")]
    pub reference: Option<String>,

    /// Single source to report on
    #[arg(short, long, requires = "reference")]
    pub source: Option<String>,

    /// Source layout for --source
    #[arg(short, long, value_enum, default_value = "auto")]
    pub mode: ModeArg,

    /// JSON catalog of programs to compare
    #[arg(short, long, required_unless_present = "source")]
    pub catalog: Option<String>,

    /// Catalog programs to include (repeatable; all when omitted)
    #[arg(short, long = "program")]
    pub programs: Vec<String>,

    /// Group roster: CSV/Parquet with pesquisador,grupo or "Name, Group" lines
    #[arg(long)]
    pub roster: Option<String>,

    /// Only keep researchers whose name contains this term
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Scored records output (.parquet or .csv); report JSON, matrix and log are written beside it
    #[arg(short, long, default_value = "report.parquet")]
    pub output: String,

    /// Directory for cached reconciliation results
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}

#[derive(Parser, Clone)]
pub struct SearchArgs {
    /// JSON catalog of programs
    #[arg(short, long, required = true)]
    pub catalog: String,

    /// Name or part of a name to look for (accents and case are ignored)
    #[arg(short, long, required = true)]
    pub term: String,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}
