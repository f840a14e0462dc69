//! pwrite entry point.

mod app;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();
    let mut config = config::Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        file = %args.local_file.display(),
        path = %args.logical_path,
        streams = config.stream_count,
        base_url = %config.base_url,
        "starting upload"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(app::run(&args, config))?;

    let secs = summary.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.bytes_sent() as f64 / secs
    } else {
        0.0
    };
    tracing::info!(
        handle = %summary.handle,
        bytes = summary.bytes_sent(),
        size = %app::human_bytes(summary.bytes_sent()),
        frames = summary.frames_sent(),
        elapsed_secs = %format!("{secs:.2}"),
        rate = %format!("{}/s", app::human_bytes(rate as u64)),
        "upload finished"
    );
    if summary.short_read() {
        tracing::warn!(
            expected = summary.file_size,
            sent = summary.bytes_sent(),
            "local file shrank during upload; the object may be incomplete"
        );
    }

    Ok(())
}
