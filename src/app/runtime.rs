use std::time::Duration;

use crate::adapters::attestation_api::{ApiError, AttestationSession};
use crate::adapters::http::{HttpTransport, ReqwestTransport};
use crate::adapters::session_store::FileSessionStore;
use crate::adapters::snapshot_file::{read_snapshot, write_snapshot};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::domain::changes::{ChangeDetector, ChangeReport};
use crate::domain::history::fetch_history;
use crate::domain::models::Credentials;
use crate::domain::snapshot::{DeviceHistory, Snapshot};

/// Lists every device and walks its full history, one device at a time in
/// listing order.
pub fn collect_snapshot<T>(session: &mut AttestationSession<T>) -> Result<Snapshot, ApiError>
where
    T: HttpTransport,
{
    let devices = session.list_devices()?;
    let mut snapshot = Snapshot::new();

    for device in devices {
        let Some(fingerprint) = device.fingerprint().map(str::to_string) else {
            tracing::warn!(name = ?device.name(), "device without fingerprint skipped");
            continue;
        };
        let start_cursor = device.start_cursor();

        tracing::info!(
            fingerprint = %fingerprint,
            name = ?device.name(),
            start_cursor = ?start_cursor,
            "fetching device history"
        );

        let fetched = fetch_history(session, &fingerprint, start_cursor)?;

        if fetched.end.is_complete() {
            tracing::info!(
                fingerprint = %fingerprint,
                entries = fetched.entries.len(),
                pages = fetched.pages,
                "device history complete"
            );
        } else {
            tracing::warn!(
                fingerprint = %fingerprint,
                entries = fetched.entries.len(),
                pages = fetched.pages,
                end = ?fetched.end,
                "device history incomplete"
            );
        }

        snapshot.insert(
            fingerprint,
            DeviceHistory {
                device,
                history: fetched.entries,
            },
        );
    }

    Ok(snapshot)
}

pub fn fetch(config: &AppConfig, credentials: &Credentials) -> Result<Snapshot, AppError> {
    let transport = ReqwestTransport::new(
        &config.origin,
        Duration::from_secs(config.http_timeout_secs),
    )
    .map_err(AppError::fetch)?;
    let store = FileSessionStore::new(&config.cookie_file);

    let mut session = AttestationSession::ensure(transport, &config.base_url, &store, credentials)
        .map_err(|error| {
            tracing::error!(error = %error, "could not establish session");
            AppError::fetch(error)
        })?;

    let snapshot = collect_snapshot(&mut session).map_err(|error| {
        tracing::error!(error = %error, "fetch run failed");
        AppError::fetch(error)
    })?;

    write_snapshot(&config.snapshot_file, &snapshot).map_err(AppError::snapshot)?;

    tracing::info!(
        path = %config.snapshot_file.display(),
        devices = snapshot.len(),
        entries = snapshot.total_entries(),
        "snapshot written"
    );

    Ok(snapshot)
}

pub fn detector_for(config: &AppConfig) -> ChangeDetector {
    ChangeDetector::new()
        .with_extra_ignored(config.extra_ignored_fields.iter().cloned())
        .flag_new_fields(config.flag_new_fields)
}

/// `Ok(None)` when there is no snapshot to compare yet.
pub fn diff(config: &AppConfig) -> Result<Option<ChangeReport>, AppError> {
    let Some(snapshot) = read_snapshot(&config.snapshot_file).map_err(AppError::snapshot)? else {
        tracing::warn!(
            path = %config.snapshot_file.display(),
            "no snapshot file, nothing to compare"
        );
        return Ok(None);
    };

    let report = detector_for(config).detect(&snapshot);
    tracing::info!(
        devices = report.devices.len(),
        changes = report.change_count(),
        "change report computed"
    );
    Ok(Some(report))
}

/// Text for the diff binary: the report, or a notice when no snapshot exists.
pub fn diff_output(config: &AppConfig) -> Result<String, AppError> {
    Ok(match diff(config)? {
        Some(report) => report.to_string(),
        None => format!(
            "no snapshot file at {}, run the fetch first\n",
            config.snapshot_file.display()
        ),
    })
}
