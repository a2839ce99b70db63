use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::mpsc;

use relaunch_core::{
    DownloadProgress, DownloadedUpdate, EffectiveChannel, FeedError, FeedSettings,
    UpdateCheckResult, UpdateFeedClient,
};

use crate::download::{download_asset, download_path};
use crate::release::{GitHubRelease, select_release};
use crate::single_flight::SingleFlight;

const GITHUB_API: &str = "https://api.github.com";

type CheckOutcome = Result<Option<GitHubRelease>, FeedError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Update feed backed by the releases of one GitHub repository.
pub struct GitHubReleasesFeed {
    client: reqwest::Client,
    repository: String,
    current_version: String,
    download_dir: PathBuf,
    settings: Mutex<FeedSettings>,
    pending: Mutex<Option<GitHubRelease>>,
    downloaded: Mutex<Option<DownloadedUpdate>>,
    checks: SingleFlight<CheckOutcome>,
}

impl GitHubReleasesFeed {
    /// Create a feed for `repository` (`owner/name`).
    ///
    /// # Errors
    /// Returns [`FeedError::InvalidConfiguration`] when the repository is not
    /// in `owner/name` form.
    pub fn new(
        client: reqwest::Client,
        repository: &str,
        current_version: impl Into<String>,
        download_dir: PathBuf,
    ) -> Result<Self, FeedError> {
        let valid = repository
            .split_once('/')
            .is_some_and(|(owner, name)| {
                !owner.is_empty() && !name.is_empty() && !name.contains('/')
            });
        if !valid {
            return Err(FeedError::InvalidConfiguration(format!(
                "repository must be in owner/name form, got \"{repository}\""
            )));
        }

        Ok(Self {
            client,
            repository: repository.to_string(),
            current_version: current_version.into(),
            download_dir,
            settings: Mutex::new(FeedSettings::default()),
            pending: Mutex::new(None),
            downloaded: Mutex::new(None),
            checks: SingleFlight::new(),
        })
    }

    #[must_use]
    pub fn settings(&self) -> FeedSettings {
        *lock(&self.settings)
    }

    fn releases_url(&self) -> String {
        format!("{GITHUB_API}/repos/{}/releases?per_page=30", self.repository)
    }

    /// Install a downloaded update when the host quits, if configured to.
    /// Returns whether an installer was started.
    pub fn install_pending_on_quit(&self) -> bool {
        if !self.settings().auto_install_on_quit || lock(&self.downloaded).is_none() {
            return false;
        }

        match self.install_and_quit(false) {
            Ok(()) => true,
            Err(error) => {
                warn!("Failed to install update on quit: {error}");
                false
            }
        }
    }
}

async fn fetch_release(
    client: reqwest::Client,
    url: String,
    settings: FeedSettings,
) -> CheckOutcome {
    let response = client
        .get(&url)
        .header("User-Agent", "relaunch")
        .header("Accept", "application/vnd.github+json")
        .send()
        .await
        .map_err(|error| FeedError::network_request_from("check for update", error))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body_snippet = response
            .text()
            .await
            .ok()
            .map(|body| response_snippet(&body, 160))
            .unwrap_or_default();
        return Err(FeedError::HttpStatus {
            status,
            body_snippet,
        });
    }

    let releases: Vec<GitHubRelease> = response
        .json()
        .await
        .map_err(|error| FeedError::network_parse_from("check for update", error))?;

    Ok(select_release(&releases, &settings).cloned())
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[async_trait]
impl UpdateFeedClient for GitHubReleasesFeed {
    fn configure(&self, settings: &FeedSettings) -> Result<(), FeedError> {
        if settings.channel != EffectiveChannel::Latest && !settings.allow_prerelease {
            return Err(FeedError::InvalidConfiguration(format!(
                "channel {} requires prerelease updates to be allowed",
                settings.channel
            )));
        }

        *lock(&self.settings) = *settings;
        Ok(())
    }

    async fn check_for_update(&self) -> Result<Option<UpdateCheckResult>, FeedError> {
        let client = self.client.clone();
        let url = self.releases_url();
        let settings = self.settings();

        let release = self
            .checks
            .run(move || fetch_release(client, url, settings))
            .await?;

        let result = release.as_ref().map(GitHubRelease::to_check_result);
        *lock(&self.pending) = release;
        Ok(result)
    }

    async fn download(
        &self,
        progress: mpsc::Sender<DownloadProgress>,
    ) -> Result<DownloadedUpdate, FeedError> {
        let release = lock(&self.pending)
            .clone()
            .ok_or(FeedError::NoPendingUpdate)?;
        let asset = release.platform_asset().ok_or_else(|| {
            FeedError::platform(
                "no release asset for this platform",
                release.tag_name.clone(),
            )
        })?;

        let dest = download_path(&self.download_dir, asset);
        download_asset(&self.client, asset, &dest, &progress).await?;

        let downloaded = DownloadedUpdate {
            version: release.version().to_string(),
            files: vec![dest],
        };
        *lock(&self.downloaded) = Some(downloaded.clone());
        Ok(downloaded)
    }

    fn install_and_quit(&self, run_after_install: bool) -> Result<(), FeedError> {
        let downloaded = lock(&self.downloaded)
            .clone()
            .ok_or(FeedError::NoPendingUpdate)?;
        let installer = downloaded
            .files
            .first()
            .ok_or(FeedError::NoPendingUpdate)?;

        info!(
            "Launching installer {} for {} (run after install: {run_after_install})",
            installer.display(),
            downloaded.version
        );
        open::that_detached(installer)
            .map_err(|error| FeedError::platform("failed to launch installer", error.to_string()))
    }

    fn current_version(&self) -> String {
        self.current_version.clone()
    }
}
