//! Persistence Integration Tests
//!
//! Queue state written through SQLite survives a restart, and a reset
//! leaves nothing behind.

use std::path::PathBuf;
use std::sync::Arc;

use truckq_core::application::constants::{HOUR_MS, MINUTE_MS};
use truckq_core::application::snapshot::{DRIVERS_KEY, REGISTRATIONS_KEY};
use truckq_core::application::{CheckInOutcome, QueueConfig, QueueService, RegistrationForm};
use truckq_core::domain::{DomainError, DriverStatus, RegistrationState, Route, VehicleType};
use truckq_core::port::{ManualTimeProvider, SequentialIdProvider, SnapshotStore};
use truckq_core::AppError;
use truckq_infra_sqlite::{create_pool, run_migrations, SqliteSnapshotStore};

// 2024-11-22T00:00:00Z
const TODAY: i64 = 1_732_233_600_000;
const PASSPHRASE: &str = "open-sesame";

fn temp_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "truckq_{}_{}.db",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

async fn open(
    db_path: &str,
    clock: Arc<ManualTimeProvider>,
    id_prefix: &str,
) -> (QueueService, Arc<SqliteSnapshotStore>) {
    let pool = create_pool(db_path).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let store = Arc::new(SqliteSnapshotStore::new(pool, clock.clone()));
    let service = QueueService::load(
        store.clone(),
        Arc::new(SequentialIdProvider::new(id_prefix)),
        clock,
        QueueConfig::default().with_reset_passphrase(PASSPHRASE),
    )
    .await
    .unwrap();
    (service, store)
}

/// State written before a restart is read back in the same order
#[tokio::test]
async fn test_state_survives_restart() {
    let db = temp_db("restart");
    let db_path = db.to_string_lossy().into_owned();
    let clock = Arc::new(ManualTimeProvider::new(TODAY + 7 * HOUR_MS));
    let slot = TODAY + 9 * HOUR_MS;

    let (walk_in_id, continuous_id, queue_before) = {
        let (service, _store) = open(&db_path, clock.clone(), "first").await;

        let walk_in = service
            .submit_registration(RegistrationForm::walk_in(
                "Zhou",
                "13100000000",
                "SU-E 100",
                VehicleType::Normal,
            ))
            .await
            .unwrap();
        let continuous = service
            .submit_registration(RegistrationForm {
                license_number: Some(" lic-42 ".to_string()),
                ..RegistrationForm::continuous(
                    "Wu",
                    "13200000000",
                    "SU-E 200",
                    VehicleType::Refrigerated,
                    slot,
                )
            })
            .await
            .unwrap();

        clock.set(slot + 5 * MINUTE_MS);
        service.check_in(&continuous.id).await.unwrap();
        service
            .dispatch_vehicle(&walk_in.id, "tr-5", Route::Regional)
            .await
            .unwrap();

        (walk_in.id, continuous.id, service.history(None).await)
    };

    let (service, _store) = open(&db_path, clock.clone(), "second").await;

    assert_eq!(service.history(None).await, queue_before);

    let walk_in = service.registration(&walk_in_id).await.unwrap();
    assert_eq!(walk_in.state(), RegistrationState::Dispatched);
    assert_eq!(walk_in.trailer_number.as_deref(), Some("TR-5"));
    assert_eq!(walk_in.route, Some(Route::Regional));

    let continuous = service.registration(&continuous_id).await.unwrap();
    assert_eq!(continuous.check_in_time, Some(slot + 5 * MINUTE_MS));
    assert_eq!(
        continuous.driver.license_number.as_deref(),
        Some("LIC-42")
    );

    let drivers = service.drivers().await;
    assert_eq!(drivers.len(), 2);
    assert!(drivers
        .iter()
        .any(|d| d.status == DriverStatus::Dispatched && d.trailer_number.as_deref() == Some("TR-5")));

    // Vehicles come back from the registrations
    assert_eq!(service.vehicles().await.len(), 2);

    // Rules still apply to reloaded plates
    assert!(service
        .submit_registration(RegistrationForm::walk_in(
            "Zhou",
            "13100000000",
            "su-e 100",
            VehicleType::Normal,
        ))
        .await
        .is_err());

    drop(service);
    let _ = std::fs::remove_file(&db);
}

/// A missed check-in written before a restart still blocks the plate
#[tokio::test]
async fn test_penalty_survives_restart() {
    let db = temp_db("penalty");
    let db_path = db.to_string_lossy().into_owned();
    let clock = Arc::new(ManualTimeProvider::new(TODAY + 6 * HOUR_MS));

    {
        let (service, _store) = open(&db_path, clock.clone(), "first").await;
        let reg = service
            .submit_registration(RegistrationForm::continuous(
                "Feng",
                "13300000000",
                "PEN-1",
                VehicleType::Normal,
                TODAY + 10 * HOUR_MS,
            ))
            .await
            .unwrap();

        clock.set(TODAY + 9 * HOUR_MS);
        let outcome = service.check_in(&reg.id).await.unwrap();
        assert!(matches!(outcome, CheckInOutcome::MissedWindow { .. }));
    }

    let (service, _store) = open(&db_path, clock.clone(), "second").await;
    let pending = service.pending_check_ins(Some("pen")).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].missed_check_in_time, Some(TODAY + 9 * HOUR_MS));
    assert_eq!(pending[0].state(), RegistrationState::MissedWindow);

    let err = service
        .submit_registration(RegistrationForm::walk_in(
            "Feng",
            "13300000000",
            "PEN-1",
            VehicleType::Normal,
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::VehicleInPenalty { .. })
    ));

    drop(service);
    let _ = std::fs::remove_file(&db);
}

/// Reset with the right passphrase empties memory and the database
#[tokio::test]
async fn test_reset_clears_database() {
    let clock = Arc::new(ManualTimeProvider::new(TODAY + 8 * HOUR_MS));
    let (service, store) = open(":memory:", clock.clone(), "reg").await;
    let mut events = service.subscribe();

    service
        .submit_registration(RegistrationForm::walk_in(
            "Chu",
            "13400000000",
            "RST-1",
            VehicleType::Normal,
        ))
        .await
        .unwrap();
    assert!(store.load(REGISTRATIONS_KEY).await.unwrap().is_some());

    assert!(!service.clear_all_data("wrong").await.unwrap());
    assert_eq!(service.history(None).await.len(), 1);

    assert!(service.clear_all_data(PASSPHRASE).await.unwrap());
    assert!(service.history(None).await.is_empty());
    assert!(service.drivers().await.is_empty());
    assert!(store.load(REGISTRATIONS_KEY).await.unwrap().is_none());
    assert!(store.load(DRIVERS_KEY).await.unwrap().is_none());

    let mut saw_reset = false;
    while let Some(event) = events.try_recv() {
        saw_reset |= event == truckq_core::application::QueueEvent::Reset;
    }
    assert!(saw_reset);

    // The plate can register again right away
    service
        .submit_registration(RegistrationForm::walk_in(
            "Chu",
            "13400000000",
            "RST-1",
            VehicleType::Normal,
        ))
        .await
        .unwrap();
}

/// A corrupt row in the snapshots table loads as an empty queue
#[tokio::test]
async fn test_corrupt_snapshot_row_loads_empty() {
    let pool = create_pool(":memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    sqlx::query("INSERT INTO snapshots (key, data, updated_at) VALUES (?, ?, 0)")
        .bind(REGISTRATIONS_KEY)
        .bind(&b"{not json"[..])
        .execute(&pool)
        .await
        .unwrap();

    let clock = Arc::new(ManualTimeProvider::new(TODAY));
    let store = Arc::new(SqliteSnapshotStore::new(pool, clock.clone()));
    let service = QueueService::load(
        store,
        Arc::new(SequentialIdProvider::new("reg")),
        clock,
        QueueConfig::default(),
    )
    .await
    .unwrap();

    assert!(service.history(None).await.is_empty());
    assert!(service.queue().await.is_empty());
}

/// Stored blobs are plain JSON arrays
#[tokio::test]
async fn test_snapshot_format_is_json_array() {
    let clock = Arc::new(ManualTimeProvider::new(TODAY + 8 * HOUR_MS));
    let (service, store) = open(":memory:", clock, "reg").await;

    service
        .submit_registration(RegistrationForm::walk_in(
            "Han",
            "13000000000",
            "JSON-1",
            VehicleType::Dangerous,
        ))
        .await
        .unwrap();

    let blob = store.load(REGISTRATIONS_KEY).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    let array = value.as_array().unwrap();
    assert_eq!(array.len(), 1);
    assert_eq!(array[0]["vehicle"]["plate_number"], "JSON-1");
    assert_eq!(array[0]["vehicle"]["vehicle_type"], "DANGEROUS");
}
