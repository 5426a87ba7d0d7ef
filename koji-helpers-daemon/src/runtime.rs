use std::future::Future;

use tokio::sync::broadcast;

use koji_helpers_core::ConfigError;
use koji_helpers_core::Config;
use koji_helpers_pipeline::{RegenPipeline, SmashdPipeline};
use koji_helpers_tools::{HttpFingerprints, KojiClient, RepoMetadataSource, RetryPolicy, TagHistorySource};

use crate::deadletter::DeadLetterJournal;
use crate::error::{io_err, DaemonError};
use crate::intervals::{IntervalBounds, IntervalController};
use crate::monitor::Monitor;
use crate::paths::MonitorId;
use crate::state_store::StateStore;

/// Deferred construction of a monitor; runs on the blocking pool.
pub type Launcher = Box<dyn FnOnce() -> Result<Monitor, DaemonError> + Send>;

/// Install the global subscriber. `RUST_LOG` wins over the `info` default.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Build a multi-thread runtime and block the current thread on `task`.
pub fn start_blocking<F>(task: F) -> Result<(), DaemonError>
where
    F: Future<Output = Result<(), DaemonError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(task)
}

// ---------------------------------------------------------------------------
// Monitor construction
// ---------------------------------------------------------------------------

/// The tag-history monitor driving sign → compose → notify.
pub fn smashd_monitor(config: &Config) -> Result<Monitor, DaemonError> {
    let smashd = config.smashd()?;
    let id = MonitorId::Smashd;
    let source = TagHistorySource::new(
        KojiClient::new(config.tools.koji.clone()),
        smashd.exclude_tags.clone(),
        RetryPolicy::from(smashd.retry),
    );
    let pipeline = SmashdPipeline::from_config(config)?;
    let intervals = IntervalController::new(
        IntervalBounds::from_seconds(smashd.min_interval, smashd.max_interval),
        smashd.check_interval.as_duration(),
        smashd.quiescent_period.as_duration(),
    );
    Ok(Monitor::open(
        id.clone(),
        Box::new(source),
        Box::new(pipeline),
        intervals,
        StateStore::for_monitor(&config.state_dir, &id),
        DeadLetterJournal::for_monitor(&config.state_dir, &id),
    ))
}

/// The metadata monitor for one buildroot, driving `regen-repo`.
pub fn gojira_monitor(config: &Config, buildroot: &str) -> Result<Monitor, DaemonError> {
    let settings = config
        .buildroots
        .get(buildroot)
        .ok_or_else(|| ConfigError::Invalid(format!("no buildroot named '{buildroot}'")))?;
    let gojira = &config.gojira;
    let id = MonitorId::gojira(buildroot);
    let source = RepoMetadataSource::new(
        buildroot,
        settings.dependency_urls(),
        HttpFingerprints::new(gojira.http_timeout.as_duration()),
        RetryPolicy::from(gojira.retry),
    );
    let pipeline = RegenPipeline::new(KojiClient::new(config.tools.koji.clone()), buildroot);
    // Both start at the floor until a regen shows how long one takes.
    let bounds = IntervalBounds::from_seconds(gojira.min_interval, gojira.max_interval);
    let intervals = IntervalController::new(bounds, bounds.min(), bounds.min());
    Ok(Monitor::open(
        id.clone(),
        Box::new(source),
        Box::new(pipeline),
        intervals,
        StateStore::for_monitor(&config.state_dir, &id),
        DeadLetterJournal::for_monitor(&config.state_dir, &id),
    ))
}

// ---------------------------------------------------------------------------
// Daemons
// ---------------------------------------------------------------------------

pub async fn run_smashd(config: Config) -> Result<(), DaemonError> {
    let launcher: Launcher = Box::new(move || smashd_monitor(&config));
    run_monitors(vec![(MonitorId::Smashd, launcher)]).await
}

pub async fn run_gojira(config: Config) -> Result<(), DaemonError> {
    if config.buildroots.is_empty() {
        return Err(ConfigError::MissingSection("buildroots").into());
    }
    let config = std::sync::Arc::new(config);
    let launchers = config
        .buildroots
        .keys()
        .map(|buildroot| {
            let config = config.clone();
            let name = buildroot.clone();
            let launcher: Launcher = Box::new(move || gojira_monitor(&config, &name));
            (MonitorId::gojira(buildroot.as_str()), launcher)
        })
        .collect();
    run_monitors(launchers).await
}

/// Run independent monitors until ctrl-c or the first fatal error.
///
/// Every task broadcasts shutdown on exit, so one monitor dying stops the
/// rest at their next sleep. The first fatal error is returned.
pub async fn run_monitors(launchers: Vec<(MonitorId, Launcher)>) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let mut handles = Vec::with_capacity(launchers.len());
    for (id, launch) in launchers {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let name = id.to_string();
        let handle = tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(launch).await {
                Ok(Ok(monitor)) => monitor.run(shutdown_rx).await,
                Ok(Err(err)) => Err(err),
                Err(err) => Err(DaemonError::Join(id.to_string(), err.to_string())),
            };
            let _ = shutdown.send(());
            result
        });
        handles.push((name, handle));
    }

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down monitors");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Signal(err.to_string())),
                    }
                }
            }
        })
    };

    let mut first_failure = None;
    for (name, handle) in handles {
        if let Err(err) = handle_join(&name, handle.await) {
            tracing::error!(monitor = %name, error = %err, "monitor died");
            first_failure.get_or_insert(err);
        }
    }
    // Every monitor is gone; make sure the signal task wakes up.
    let _ = shutdown_tx.send(());
    handle_join("signal_handler", signal_handle.await)?;

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join(task.to_string(), err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use koji_helpers_core::{ActionError, ActionPipeline, ChangeSnapshot, ChangeSource, Watermark};
    use tempfile::TempDir;

    struct Quiet;

    impl ChangeSource for Quiet {
        fn describe(&self) -> String {
            "quiet".into()
        }

        fn query(&mut self, _: &Watermark, _: &Watermark) -> ChangeSnapshot {
            ChangeSnapshot::new()
        }
    }

    struct Never;

    impl ActionPipeline for Never {
        fn describe(&self) -> String {
            "never".into()
        }

        fn execute(&mut self, _: &ChangeSnapshot) -> Result<(), ActionError> {
            Ok(())
        }
    }

    fn quiet_monitor(state_dir: &Path, id: MonitorId) -> Monitor {
        let bounds = IntervalBounds::new(Duration::from_secs(1), Duration::from_secs(10));
        Monitor::open(
            id.clone(),
            Box::new(Quiet),
            Box::new(Never),
            IntervalController::new(bounds, bounds.min(), bounds.min()),
            StateStore::for_monitor(state_dir, &id),
            DeadLetterJournal::for_monitor(state_dir, &id),
        )
    }

    #[tokio::test]
    async fn one_fatal_monitor_stops_the_rest() {
        let dir = TempDir::new().expect("tempdir");
        let healthy_dir = dir.path().to_path_buf();
        let healthy: Launcher =
            Box::new(move || Ok(quiet_monitor(&healthy_dir, MonitorId::gojira("f38-build"))));
        let broken: Launcher = Box::new(|| {
            Err(ConfigError::Invalid("no buildroot named 'f39-build'".to_string()).into())
        });

        let err = tokio::time::timeout(
            Duration::from_secs(30),
            run_monitors(vec![
                (MonitorId::gojira("f38-build"), healthy),
                (MonitorId::gojira("f39-build"), broken),
            ]),
        )
        .await
        .expect("runtime stopped")
        .unwrap_err();
        assert!(err.to_string().contains("f39-build"), "got: {err}");
    }

    #[test]
    fn gojira_requires_buildroots() {
        let config = Config::parse("state_dir: /tmp/x\n", Path::new("test.yaml")).expect("config");
        let err = tokio_test::block_on(run_gojira(config)).unwrap_err();
        assert!(matches!(err, DaemonError::Config(ConfigError::MissingSection("buildroots"))));
    }

    #[test]
    fn smashd_requires_its_section() {
        let config = Config::parse("state_dir: /tmp/x\n", Path::new("test.yaml")).expect("config");
        assert!(matches!(
            smashd_monitor(&config),
            Err(DaemonError::Config(ConfigError::MissingSection("smashd")))
        ));
    }
}
