use std::{io::IsTerminal, path::Path, time::Duration};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::{fs::File, io::AsyncWriteExt, sync::watch};
use tracing::{debug, info};

use crate::{container::cancelled, error::SetupError};

fn download_error(url: &str) -> impl FnOnce(reqwest::Error) -> SetupError {
    let url = url.to_string();
    move |source| SetupError::Download { url, source }
}

fn progress_bar(total: Option<u64>) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            ) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.enable_steady_tick(Duration::from_millis(200));
            bar
        }
    }
}

/// Size announced by the mirror, if any.
pub async fn remote_size(client: &reqwest::Client, url: &str) -> Option<u64> {
    match client.head(url).send().await {
        Ok(response) if response.status().is_success() => response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok()),
        Ok(response) => {
            debug!("HEAD {} answered {}", url, response.status());
            None
        }
        Err(err) => {
            debug!("HEAD {} failed: {}", url, err);
            None
        }
    }
}

/// Streams `url` into `destination` through a `.part` file renamed once the
/// body is complete. Returns the number of bytes written.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    cancel: &mut watch::Receiver<bool>,
) -> Result<u64, SetupError> {
    let part_path = destination.with_extension("pbf.part");

    info!("Downloading {} to {}", url, destination.display());

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(download_error(url))?;

    let total = response.content_length();
    let bar = progress_bar(total);

    let mut file = File::create(&part_path)
        .await
        .map_err(SetupError::io(&part_path))?;

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    let mut next_milestone = 10;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancelled(cancel) => {
                bar.abandon();
                drop(file);
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(SetupError::Cancelled);
            }
            chunk = stream.next() => chunk,
        };

        let Some(chunk) = chunk else {
            break;
        };
        let chunk = chunk.map_err(download_error(url))?;

        file.write_all(&chunk)
            .await
            .map_err(SetupError::io(&part_path))?;

        written += chunk.len() as u64;
        bar.set_position(written);

        if let Some(total) = total
            && total > 0
            && written * 100 / total >= next_milestone
        {
            info!("Downloaded {}% ({} MiB)", next_milestone, written / (1024 * 1024));
            next_milestone += 10;
        }
    }

    file.flush().await.map_err(SetupError::io(&part_path))?;
    drop(file);
    bar.finish_and_clear();

    tokio::fs::rename(&part_path, destination)
        .await
        .map_err(SetupError::io(destination))?;

    info!("Downloaded {} MiB", written / (1024 * 1024));

    Ok(written)
}
