use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pwrite_transfer::{ProgressSnapshot, ProgressTracker};
use pwrite_upload::{
    HttpTransport, SessionCoordinator, UploadEvent, UploadSummary, authenticate,
};
use tokio::sync::mpsc;

use crate::cli::Args;
use crate::config::Config;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Authenticates, uploads the file, and returns the summary.
///
/// Ctrl-C cancels the streams; the session is still closed before returning.
pub async fn run(args: &Args, config: Config) -> anyhow::Result<UploadSummary> {
    let username = config
        .username
        .as_deref()
        .context("no username configured (set `username` in the config file or pass --username)")?;
    let password = config
        .password
        .as_deref()
        .context("no password configured (set PWRITE_PASSWORD or `password` in the config file)")?;

    let http = config.http_config();
    let token = authenticate(&http, username, password)
        .await
        .with_context(|| format!("authenticating against {}", http.base_url))?;
    let transport = Arc::new(HttpTransport::new(&http, &token)?);

    let file_size = tokio::fs::metadata(&args.local_file)
        .await
        .with_context(|| format!("reading {}", args.local_file.display()))?
        .len();

    let mut coordinator = SessionCoordinator::new(transport, config.upload_options());
    let cancel = coordinator.cancel_token();

    let tracker = Arc::new(ProgressTracker::new(file_size, config.stream_count));
    let feeder = coordinator
        .take_events()
        .map(|rx| tokio::spawn(track_progress(rx, Arc::clone(&tracker))));
    tracker.start(Some(PROGRESS_INTERVAL), Box::new(log_progress));

    let result = {
        let upload = coordinator.upload(&args.local_file, &args.logical_path, config.stream_count);
        tokio::pin!(upload);
        tokio::select! {
            r = &mut upload => r,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("SIGINT received, cancelling upload");
                cancel.cancel();
                upload.await
            }
        }
    };

    tracker.stop();
    // Dropping the coordinator closes the event channel and ends the feeder.
    drop(coordinator);
    if let Some(feeder) = feeder {
        let _ = feeder.await;
    }

    result.with_context(|| format!("uploading to {}", args.logical_path))
}

/// Feeds acknowledged frames into the tracker until the channel closes.
async fn track_progress(mut rx: mpsc::Receiver<UploadEvent>, tracker: Arc<ProgressTracker>) {
    while let Some(event) = rx.recv().await {
        if let UploadEvent::FrameSent {
            stream_index,
            bytes,
            ..
        } = event
        {
            tracker.record(stream_index, bytes);
        }
    }
}

fn log_progress(snap: ProgressSnapshot) {
    tracing::info!(
        sent = %human_bytes(snap.transferred_bytes),
        total = %human_bytes(snap.total_bytes),
        percent = %format!("{:.1}", snap.fraction() * 100.0),
        rate = %format!("{}/s", human_bytes(snap.bytes_per_second as u64)),
        eta_secs = snap.eta.map(|d| d.as_secs()),
        "progress"
    );
}

/// Formats a byte count with a binary unit suffix.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
