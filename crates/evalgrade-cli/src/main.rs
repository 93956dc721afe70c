//! evalgrade CLI — the command-line front end to the scoring engine.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "evalgrade", version, about = "Course evaluation scoring engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score stored records and report pass/fail per student
    Evaluate {
        /// JSON file with an array of score records
        #[arg(long)]
        records: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format: table, json, markdown
        #[arg(long, default_value = "table")]
        format: String,

        /// Also save the report as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit code 1 if any student fails
        #[arg(long)]
        fail_on_fail: bool,
    },

    /// Enter marks for one component and write them back to the records file
    Enter {
        /// JSON file with an array of score records (created if missing)
        #[arg(long)]
        records: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Component to enter (CA1, CA2, CA3, LAB, ASSIGNMENT)
        #[arg(long)]
        component: String,

        /// Marks as `student:target=value`; target is a part key (e.g. IIb),
        /// a lab session index, or omitted for assignments
        #[arg(long = "set")]
        marks: Vec<String>,

        /// Test date for CA components (YYYY-MM-DD)
        #[arg(long)]
        test_date: Option<chrono::NaiveDate>,
    },

    /// Compare two evaluation reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Exit code 1 if a student who passed now fails
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate a course configuration file
    Validate {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the scale registry
    Scales {
        /// Only show this course type
        #[arg(long)]
        course_type: Option<String>,

        /// Config file whose overrides should be applied
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and sample records
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("evalgrade=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Evaluate {
            records,
            config,
            format,
            output,
            fail_on_fail,
        } => commands::evaluate::execute(records, config, format, output, fail_on_fail),
        Commands::Enter {
            records,
            config,
            component,
            marks,
            test_date,
        } => commands::enter::execute(records, config, component, marks, test_date).await,
        Commands::Compare {
            baseline,
            current,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, fail_on_regression, format),
        Commands::Validate { config } => commands::validate::execute(config),
        Commands::Scales {
            course_type,
            config,
        } => commands::scales::execute(course_type, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
