use std::io::{self, BufWriter, Write};

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use crate::demo::Demo;

#[derive(Parser, Debug, Default)]
#[command(name = "seqflow")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To run every demonstration:\n\
    seqflow\n\n\
    ## To run the terminal operations with parallel reductions:\n\
    seqflow --parallel terminal\n\n\
    ## To trace how pipelines are driven:\n\
    seqflow -vv intermediate")]
#[command(
    about = "seqflow walks through lazy sequence pipelines: sources, stages, terminals and Optional.",
    long_about = None
)]
pub struct Cli {
    #[clap(subcommand)]
    commands: Option<Commands>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run the reduction and collection demos on a parallel pipeline
    #[cfg(feature = "parallel")]
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Number of partitions used by parallel pipelines
    #[cfg(feature = "parallel")]
    #[arg(long, requires = "parallel")]
    partitions: Option<usize>,

    /// Disable colored output
    #[arg(long, default_value_t = false)]
    no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Finite and infinite sources
    Create,
    /// count, min/max, find, match, for_each, reduce and collect
    Terminal,
    /// filter, distinct, skip/limit, map, flat_map, concat, sorted and peek
    Intermediate,
    /// Presence checks and fallbacks on Optional
    Optional,
    /// Every demonstration in order
    All,
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        self.init_tracing();

        if self.no_color {
            colored::control::set_override(false);
        }

        let stdout = io::stdout();
        let mut demo = Demo::new(BufWriter::new(stdout.lock()));
        #[cfg(feature = "parallel")]
        if self.parallel {
            let mut options = seqflow::Options::default();
            if let Some(partitions) = self.partitions {
                options.set_partitions(partitions);
            }
            options.set_min_partition_len(1);
            demo.set_parallel(options);
        }

        match self.commands.unwrap_or(Commands::All) {
            Commands::Create => demo.create()?,
            Commands::Terminal => demo.terminal()?,
            Commands::Intermediate => demo.intermediate()?,
            Commands::Optional => demo.optional()?,
            Commands::All => demo.all()?,
        }

        demo.into_inner().flush().into_diagnostic()
    }

    fn init_tracing(&self) {
        let level = match self.verbose {
            0 => "warn",
            1 => "seqflow=debug",
            _ => "seqflow=trace",
        };

        // Ignore the error from a subscriber installed earlier in the process.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
            .with_writer(io::stderr)
            .try_init();
    }
}
