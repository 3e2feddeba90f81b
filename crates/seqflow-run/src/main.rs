use clap::Parser;

fn main() -> miette::Result<()> {
    seqflow_run::Cli::parse().run()
}
