// Network diagnostics - sanity checks run at startup and on demand
//
// None of these checks gate anything; they exist so the log explains why a
// whole cycle produced nothing when the host has DNS trouble, the platform
// is unreachable, or yt-dlp is missing.

use std::net::ToSocketAddrs;
use std::time::Duration;

use log::{info, warn};

use crate::downloader::utils::{find_ytdlp, ytdlp_version};
use crate::metadata::MetadataBackend;

const PROBE_HOST: &str = "www.youtube.com";
// Long-lived upload that should always probe as available
const REFERENCE_VIDEO_ID: &str = "dQw4w9WgXcQ";

pub async fn run_diagnostics(metadata: &dyn MetadataBackend) {
    info!("[Diagnostics] Checking network and tooling");

    match (PROBE_HOST, 443).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => info!("[Diagnostics] DNS {}: {}", PROBE_HOST, addr.ip()),
            None => warn!("[Diagnostics] DNS {}: no addresses returned", PROBE_HOST),
        },
        Err(e) => warn!("[Diagnostics] DNS {} failed: {}", PROBE_HOST, e),
    }

    match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => match client.get(format!("https://{}", PROBE_HOST)).send().await {
            Ok(response) => info!("[Diagnostics] HTTPS {}: {}", PROBE_HOST, response.status()),
            Err(e) => warn!("[Diagnostics] HTTPS {} failed: {}", PROBE_HOST, e),
        },
        Err(e) => warn!("[Diagnostics] Could not build HTTP client: {}", e),
    }

    let ytdlp = find_ytdlp();
    match ytdlp_version(&ytdlp) {
        Some(version) => info!("[Diagnostics] yt-dlp {} at {}", version, ytdlp),
        None => warn!("[Diagnostics] yt-dlp not runnable at {}", ytdlp),
    }

    match metadata.probe(REFERENCE_VIDEO_ID).await {
        Ok(outcome) if outcome.is_present() => {
            info!("[Diagnostics] Reference video probes as available")
        }
        Ok(_) => warn!("[Diagnostics] Reference video probes as unavailable"),
        Err(e) => warn!("[Diagnostics] Reference video probe failed: {}", e),
    }
}
