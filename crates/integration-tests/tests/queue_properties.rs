//! Property tests over random operation sequences
//!
//! Whatever order registrations, check-ins, dispatches and clock moves
//! arrive in, the queue stays ordered, the plate rules hold, and a reload
//! from the store gives back the same registrations.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use truckq_core::application::constants::MINUTE_MS;
use truckq_core::application::{PrioritySorter, QueueConfig, QueueService, RegistrationForm};
use truckq_core::domain::{Registration, Route, VehicleType};
use truckq_core::port::{ManualTimeProvider, MemorySnapshotStore, SequentialIdProvider, TimeProvider};

// 2024-11-22T06:00:00Z
const START: i64 = 1_732_255_200_000;

#[derive(Debug, Clone)]
enum Op {
    WalkIn(u8),
    Continuous(u8, i64),
    CheckIn(usize),
    Dispatch(usize),
    Advance(i64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::WalkIn),
        (0u8..6, 0i64..720).prop_map(|(plate, minutes)| Op::Continuous(plate, minutes)),
        (0usize..16).prop_map(Op::CheckIn),
        (0usize..16).prop_map(Op::Dispatch),
        (1i64..600).prop_map(Op::Advance),
    ]
}

async fn load(store: Arc<MemorySnapshotStore>, clock: Arc<ManualTimeProvider>) -> QueueService {
    QueueService::load(
        store,
        Arc::new(SequentialIdProvider::new("reg")),
        clock,
        QueueConfig::default(),
    )
    .await
    .unwrap()
}

fn by_id(mut registrations: Vec<Registration>) -> Vec<Registration> {
    registrations.sort_by(|a, b| a.id.cmp(&b.id));
    registrations
}

async fn pick(service: &QueueService, index: usize) -> Option<String> {
    let history = service.history(None).await;
    if history.is_empty() {
        return None;
    }
    Some(history[index % history.len()].id.clone())
}

async fn check_invariants(service: &QueueService, now: i64) -> Result<(), TestCaseError> {
    let config = service.config();
    let sorter = PrioritySorter::new(now, config.utc_offset(), config.stale_after_ms);

    let queue = service.queue().await;
    for pair in queue.windows(2) {
        prop_assert_ne!(sorter.compare(&pair[0], &pair[1]), Ordering::Greater);
    }

    let history = service.history(None).await;
    let mut by_plate: HashMap<String, Vec<i64>> = HashMap::new();
    for reg in &history {
        if reg.is_dispatched {
            prop_assert!(reg.check_in_time.is_some());
            prop_assert!(reg.trailer_number.is_some());
        }
        if !reg.is_continuous() {
            prop_assert_eq!(reg.check_in_time, Some(reg.registered_at));
        }
        if let Some(plate) = reg.plate() {
            by_plate
                .entry(plate.to_string())
                .or_default()
                .push(reg.registered_at);
        }
    }

    for times in by_plate.values_mut() {
        times.sort_unstable();
        for pair in times.windows(2) {
            prop_assert!(pair[1] - pair[0] > config.dedup_ms);
        }
    }
    Ok(())
}

async fn apply(service: &QueueService, clock: &ManualTimeProvider, op: Op) {
    // Rejections are part of the game; only the invariants matter
    match op {
        Op::WalkIn(plate) => {
            let _ = service
                .submit_registration(RegistrationForm::walk_in(
                    "Driver",
                    "100",
                    format!("P-{}", plate),
                    VehicleType::Normal,
                ))
                .await;
        }
        Op::Continuous(plate, minutes) => {
            let _ = service
                .submit_registration(RegistrationForm::continuous(
                    "Driver",
                    "100",
                    format!("P-{}", plate),
                    VehicleType::Normal,
                    clock.now_millis() + minutes * MINUTE_MS,
                ))
                .await;
        }
        Op::CheckIn(index) => {
            if let Some(id) = pick(service, index).await {
                let _ = service.check_in(&id).await;
            }
        }
        Op::Dispatch(index) => {
            if let Some(id) = pick(service, index).await {
                let _ = service.dispatch_vehicle(&id, "TR", Route::Regional).await;
            }
        }
        Op::Advance(minutes) => clock.advance(minutes * MINUTE_MS),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_operations_keep_queue_consistent(ops in prop::collection::vec(arb_op(), 1..40)) {
        tokio_test::block_on(async move {
            let clock = Arc::new(ManualTimeProvider::new(START));
            let store = Arc::new(MemorySnapshotStore::new());
            let service = load(store.clone(), clock.clone()).await;

            for op in ops {
                apply(&service, &clock, op).await;
                check_invariants(&service, clock.now_millis()).await?;
            }

            let reloaded = load(store, clock.clone()).await;
            prop_assert_eq!(
                by_id(reloaded.history(None).await),
                by_id(service.history(None).await)
            );
            prop_assert_eq!(reloaded.drivers().await.len(), service.drivers().await.len());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
