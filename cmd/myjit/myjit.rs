use clap::Parser;
use myjit::Session;
use myjit_cli::{cli::CLI, demo, initializers::init_tracing};
use tracing::error;

fn main() -> eyre::Result<()> {
    let CLI { opts } = CLI::parse();
    init_tracing(&opts)?;

    let mut session = Session::with_config(opts.module.clone(), opts.session_config());
    if let Err(err) = demo::run(&mut session, &opts) {
        error!(%err, "myjit failed");
        let message = session.last_error().map_or_else(|| err.to_string(), str::to_string);
        eprintln!("{message}");
        std::process::exit(1);
    }
    Ok(())
}
