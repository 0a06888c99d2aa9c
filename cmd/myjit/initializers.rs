use eyre::WrapErr;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::Directive, fmt, layer::SubscriberExt};

use crate::cli::Options;

/// Install the global subscriber. Logs go to stderr so they never mix with
/// the generated program's output on stdout.
pub fn init_tracing(opts: &Options) -> eyre::Result<()> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);

    let fmt_layer = fmt::layer()
        .with_target(include_target)
        .with_writer(std::io::stderr)
        .with_filter(log_filter);

    let subscriber = Registry::default().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .wrap_err("Failed to install tracing subscriber")
}
