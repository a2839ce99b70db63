mod error;
mod logging;
mod settings;
mod single_instance;

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};
use relaunch_core::{
    NotificationSink, QuitHandle, UpdateController, UpdateFeedClient, UpdateNotification,
    UpdateState,
};
use relaunch_github::GitHubReleasesFeed;
use relaunch_platform::AppPaths;

use crate::error::AppError;
use crate::settings::AppSettings;
use crate::single_instance::SingleInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// Poll in the background until interrupted.
    Agent,
    /// Run a single check cycle and exit.
    CheckOnce,
    /// Check, download and hand over to the installer.
    InstallNow,
}

impl RunMode {
    fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, AppError> {
        let mode = match args.next().as_deref() {
            None => Self::Agent,
            Some("--check-once") => Self::CheckOnce,
            Some("--install-now") => Self::InstallNow,
            Some(other) => return Err(AppError::UnknownArgument(other.to_string())),
        };

        match args.next() {
            Some(extra) => Err(AppError::UnknownArgument(extra)),
            None => Ok(mode),
        }
    }
}

/// Writes every notification as one JSON line on stdout for the host UI.
fn stdout_sink() -> Arc<dyn NotificationSink> {
    Arc::new(|notification: UpdateNotification| {
        match serde_json::to_string(&notification) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(stdout, "{line}");
                let _ = stdout.flush();
            }
            Err(error) => warn!("Failed to serialize update notification: {error}"),
        }
    })
}

fn quit_handle() -> QuitHandle {
    Arc::new(|| {
        info!("Quitting for update install");
        log::logger().flush();
        std::process::exit(0);
    })
}

/// Drive `startup` while already listening for `interrupt`, then keep waiting
/// for it. Returns whether the interrupt cut `startup` short.
async fn until_interrupted<S, I>(startup: S, interrupt: I) -> (bool, I::Output)
where
    S: Future<Output = ()>,
    I: Future,
{
    tokio::pin!(interrupt);
    tokio::select! {
        () = startup => (false, interrupt.await),
        output = &mut interrupt => (true, output),
    }
}

async fn run(mode: RunMode) -> Result<(), AppError> {
    let paths = AppPaths::new()?;
    paths
        .ensure_dirs()
        .map_err(|error| AppError::io("create app directories", error))?;

    let _instance = SingleInstance::acquire(&paths.instance_lock_file())?;

    let settings_path = paths.settings_file();
    let settings = AppSettings::load(&settings_path);
    logging::init_logging(
        &paths.log_file(),
        settings.debug_logging,
        settings.max_log_size_bytes,
    );
    if !settings_path.exists()
        && let Err(error) = settings.save(&settings_path)
    {
        warn!("Failed to write default settings: {error}");
    }

    let client = reqwest::Client::builder()
        .timeout(settings.http_timeout())
        .build()
        .map_err(AppError::HttpClient)?;
    let feed = Arc::new(GitHubReleasesFeed::new(
        client,
        &settings.feed_repository,
        env!("CARGO_PKG_VERSION"),
        paths.download_dir(),
    )?);

    let feed_client: Arc<dyn UpdateFeedClient> = feed.clone();
    let mut controller = UpdateController::new(feed_client, stdout_sink(), quit_handle());
    controller.configure(settings.update_config())?;

    match mode {
        RunMode::CheckOnce => controller.check_now().await,
        RunMode::InstallNow => {
            controller.check_now().await;
            if matches!(controller.state(), UpdateState::Available { .. }) {
                controller.download_and_install().await?;
            }
            if matches!(controller.state(), UpdateState::Ready { .. }) {
                controller.install_and_relaunch()?;
            } else {
                info!("Nothing to install");
            }
        }
        RunMode::Agent => {
            let startup = controller.set_auto_check_updates(
                settings.auto_check_updates,
                settings.check_interval(),
            );
            let (cut_short, signal) = until_interrupted(startup, tokio::signal::ctrl_c()).await;
            if cut_short {
                info!("Interrupted during the initial update check");
            }
            if let Err(error) = signal {
                warn!("Failed to listen for shutdown signal: {error}");
            }
            info!("Shutting down");
        }
    }

    controller.shutdown();
    if feed.install_pending_on_quit() {
        info!("Installer launched on quit");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let mode = match RunMode::from_args(std::env::args().skip(1)) {
        Ok(mode) => mode,
        Err(error) => {
            eprintln!("relaunch: {error}");
            return ExitCode::from(2);
        }
    };

    match run(mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("relaunch: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::{AppError, RunMode, until_interrupted};

    fn parse(args: &[&str]) -> Result<RunMode, AppError> {
        RunMode::from_args(args.iter().map(ToString::to_string))
    }

    #[test]
    fn no_arguments_runs_the_agent() {
        assert_eq!(parse(&[]).expect("empty args should parse"), RunMode::Agent);
    }

    #[test]
    fn flags_select_one_shot_modes() {
        assert_eq!(
            parse(&["--check-once"]).expect("--check-once should parse"),
            RunMode::CheckOnce
        );
        assert_eq!(
            parse(&["--install-now"]).expect("--install-now should parse"),
            RunMode::InstallNow
        );
    }

    #[test]
    fn unknown_or_extra_arguments_are_rejected() {
        assert!(matches!(
            parse(&["--verbose"]),
            Err(AppError::UnknownArgument(arg)) if arg == "--verbose"
        ));
        assert!(matches!(
            parse(&["--check-once", "now"]),
            Err(AppError::UnknownArgument(arg)) if arg == "now"
        ));
    }

    #[tokio::test]
    async fn interrupt_cuts_a_long_startup_short() {
        let (cut_short, signal) =
            until_interrupted(std::future::pending::<()>(), async { "ctrl-c" }).await;

        assert!(cut_short);
        assert_eq!(signal, "ctrl-c");
    }

    #[tokio::test]
    async fn finished_startup_still_waits_for_interrupt() {
        let started = AtomicBool::new(false);
        let startup = async {
            started.store(true, Ordering::SeqCst);
        };
        let interrupt = async {
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            "ctrl-c"
        };

        let (cut_short, signal) = until_interrupted(startup, interrupt).await;

        assert!(!cut_short);
        assert!(started.load(Ordering::SeqCst));
        assert_eq!(signal, "ctrl-c");
    }
}
