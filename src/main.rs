use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hygiene::cli::Args;

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "hygiene=debug" } else { "hygiene=warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.debug);
    match hygiene::run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    }
}
