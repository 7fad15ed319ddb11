// Queue Service - owns the queue collections and runs every lifecycle operation
//
// Every mutation happens on a copy of the state under one lock: the copy is
// re-sorted, written through the snapshot store, and only then swapped in.

pub mod submit;

pub use submit::{validate_form, RegistrationForm};

use crate::application::config::QueueConfig;
use crate::application::constants::EVENT_CHANNEL_CAPACITY;
use crate::application::eligibility::{
    can_check_in, latest_registration_within, penalty_until, unclaimed_vehicle_within,
};
use crate::application::events::{EventPublisher, EventSubscriber, QueueEvent};
use crate::application::priority::PrioritySorter;
use crate::application::snapshot::{decode_or_empty, encode, DRIVERS_KEY, REGISTRATIONS_KEY};
use crate::domain::{
    normalize_plate, DomainError, Driver, Registration, RegistrationState, Route, Timestamp,
    Vehicle, VehicleType,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, SnapshotStore, TimeProvider};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// In-memory collections
#[derive(Debug, Clone, Default)]
struct QueueState {
    drivers: Vec<Driver>,
    /// Not persisted on its own; rebuilt from registrations at load
    vehicles: Vec<Vehicle>,
    registrations: Vec<Registration>,
}

/// Which blobs a mutation touched
#[derive(Debug, Clone, Copy)]
struct Changes {
    drivers: bool,
    registrations: bool,
}

impl Changes {
    const DRIVERS: Changes = Changes {
        drivers: true,
        registrations: false,
    };
    const REGISTRATIONS: Changes = Changes {
        drivers: false,
        registrations: true,
    };
    const ALL: Changes = Changes {
        drivers: true,
        registrations: true,
    };
}

/// Result of a check-in attempt
///
/// Arriving outside the window is not an error: it is recorded and reported
/// as `MissedWindow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInOutcome {
    CheckedIn { at: Timestamp },
    MissedWindow { missed_at: Timestamp },
    AlreadyCheckedIn { at: Timestamp },
}

/// Queue engine
pub struct QueueService {
    store: Arc<dyn SnapshotStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: QueueConfig,
    state: Mutex<QueueState>,
    events: EventPublisher,
}

fn plate_matches(registration: &Registration, filter: Option<&str>) -> bool {
    match filter.map(normalize_plate) {
        Some(needle) if !needle.is_empty() => registration
            .plate()
            .map_or(false, |plate| plate.contains(&needle)),
        _ => true,
    }
}

impl QueueService {
    /// Build the engine from whatever the snapshot store holds
    ///
    /// Missing or corrupt blobs start as empty collections; store I/O
    /// failures are returned.
    pub async fn load(
        store: Arc<dyn SnapshotStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: QueueConfig,
    ) -> Result<Self> {
        config.validate()?;

        let drivers_blob = store.load(DRIVERS_KEY).await?;
        let registrations_blob = store.load(REGISTRATIONS_KEY).await?;

        let drivers: Vec<Driver> = decode_or_empty(DRIVERS_KEY, drivers_blob.as_deref());
        let mut registrations: Vec<Registration> =
            decode_or_empty(REGISTRATIONS_KEY, registrations_blob.as_deref());
        let vehicles = registrations
            .iter()
            .filter_map(|r| r.vehicle.clone())
            .collect();

        let now = time_provider.now_millis();
        PrioritySorter::new(now, config.utc_offset(), config.stale_after_ms)
            .sort(&mut registrations);

        info!(
            drivers = drivers.len(),
            registrations = registrations.len(),
            "Queue state loaded"
        );

        Ok(Self {
            store,
            id_provider,
            time_provider,
            config,
            state: Mutex::new(QueueState {
                drivers,
                vehicles,
                registrations,
            }),
            events: EventPublisher::new(EVENT_CHANNEL_CAPACITY),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Subscribe to queue events (dispatch confirmations etc.)
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    fn sorter(&self, now: Timestamp) -> PrioritySorter {
        PrioritySorter::new(now, self.config.utc_offset(), self.config.stale_after_ms)
    }

    /// Write the touched collections through, then swap the new state in
    ///
    /// If the registrations write fails after drivers were written, the
    /// previous drivers blob is put back so memory and store still agree.
    async fn commit(&self, state: &mut QueueState, next: QueueState, changes: Changes) -> Result<()> {
        let drivers = if changes.drivers {
            Some(encode(&next.drivers)?)
        } else {
            None
        };
        let registrations = if changes.registrations {
            Some(encode(&next.registrations)?)
        } else {
            None
        };

        if let Some(blob) = &drivers {
            self.store.save(DRIVERS_KEY, blob).await?;
        }
        if let Some(blob) = &registrations {
            if let Err(e) = self.store.save(REGISTRATIONS_KEY, blob).await {
                if drivers.is_some() {
                    self.restore_drivers(&state.drivers).await;
                }
                return Err(e);
            }
        }
        *state = next;
        Ok(())
    }

    async fn restore_drivers(&self, drivers: &[Driver]) {
        let restored = match encode(drivers) {
            Ok(blob) => self.store.save(DRIVERS_KEY, &blob).await,
            Err(e) => Err(e),
        };
        if let Err(e) = restored {
            error!(error = %e, "Failed to restore drivers snapshot after a partial write");
        }
    }

    fn build_driver(
        &self,
        now: Timestamp,
        name: &str,
        phone_number: &str,
        is_continuous: bool,
        expected_check_in_time: Option<Timestamp>,
    ) -> Result<Driver> {
        let name = name.trim();
        let phone_number = phone_number.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "driver name cannot be empty".to_string(),
            ));
        }
        if phone_number.is_empty() {
            return Err(AppError::Validation(
                "phone number cannot be empty".to_string(),
            ));
        }

        Ok(Driver::new(
            self.id_provider.generate_id(),
            now,
            name,
            phone_number,
            is_continuous,
            expected_check_in_time,
        ))
    }

    /// Penalty first, then dedup, against the registrations held in `state`
    fn check_plate(&self, state: &QueueState, now: Timestamp, plate: &str) -> Result<()> {
        let plate = normalize_plate(plate);
        if plate.is_empty() {
            return Err(AppError::Validation(
                "plate number cannot be empty".to_string(),
            ));
        }

        if let Some(until) = penalty_until(&state.registrations, &plate, now, self.config.penalty_ms)
        {
            warn!(
                plate = %plate,
                until = until,
                "Vehicle rejected: missed check-in penalty"
            );
            return Err(DomainError::VehicleInPenalty { plate, until }.into());
        }

        if let Some(registered_at) =
            latest_registration_within(&state.registrations, &plate, now, self.config.dedup_ms)
        {
            warn!(
                plate = %plate,
                registered_at = registered_at,
                "Vehicle rejected: already registered within the dedup window"
            );
            return Err(DomainError::VehicleAlreadyRegistered {
                plate,
                registered_at,
            }
            .into());
        }
        Ok(())
    }

    /// Plate checks pass; only then is a vehicle created
    fn admit_vehicle(
        &self,
        state: &QueueState,
        now: Timestamp,
        plate_number: &str,
        vehicle_type: VehicleType,
    ) -> Result<Vehicle> {
        self.check_plate(state, now, plate_number)?;
        let plate = normalize_plate(plate_number);
        Ok(Vehicle::new(
            self.id_provider.generate_id(),
            now,
            &plate,
            vehicle_type,
        ))
    }

    fn build_registration(
        &self,
        now: Timestamp,
        driver: Driver,
        vehicle: Option<Vehicle>,
        expected_slot: Option<Timestamp>,
    ) -> Registration {
        let expected = expected_slot.or(driver.expected_check_in_time);
        Registration::new(
            self.id_provider.generate_id(),
            now,
            driver,
            vehicle,
            expected,
            self.config.registration_ttl_ms,
        )
    }

    fn index_of(state: &QueueState, registration_id: &str) -> Result<usize> {
        state
            .registrations
            .iter()
            .position(|r| r.id == registration_id)
            .ok_or_else(|| DomainError::RegistrationNotFound(registration_id.to_string()).into())
    }

    /// Copy the registration's driver into the driver collection
    fn sync_driver(state: &mut QueueState, driver: &Driver) {
        if let Some(entry) = state.drivers.iter_mut().find(|d| d.id == driver.id) {
            *entry = driver.clone();
        }
    }

    /// Register a driver on its own
    pub async fn register_driver(
        &self,
        name: &str,
        phone_number: &str,
        is_continuous: bool,
        expected_check_in_time: Option<Timestamp>,
    ) -> Result<Driver> {
        let mut state = self.state.lock().await;
        let now = self.time_provider.now_millis();

        let driver = self.build_driver(now, name, phone_number, is_continuous, expected_check_in_time)?;

        let mut next = (*state).clone();
        next.drivers.push(driver.clone());
        self.commit(&mut state, next, Changes::DRIVERS).await?;

        info!(
            driver_id = %driver.id,
            is_continuous = driver.is_continuous,
            "Driver registered"
        );
        Ok(driver)
    }

    /// Register a vehicle, rejecting plates under penalty or registered within the dedup window
    ///
    /// A plate already held by a vehicle that no registration has used yet
    /// counts as registered.
    pub async fn register_vehicle(
        &self,
        plate_number: &str,
        vehicle_type: VehicleType,
    ) -> Result<Vehicle> {
        let mut state = self.state.lock().await;
        let now = self.time_provider.now_millis();

        let vehicle = self.admit_vehicle(&state, now, plate_number, vehicle_type)?;
        if let Some(registered_at) = unclaimed_vehicle_within(
            &state.vehicles,
            &state.registrations,
            &vehicle.plate_number,
            now,
            self.config.dedup_ms,
        ) {
            warn!(
                plate = %vehicle.plate_number,
                registered_at = registered_at,
                "Vehicle rejected: plate held by an unused vehicle"
            );
            return Err(DomainError::VehicleAlreadyRegistered {
                plate: vehicle.plate_number,
                registered_at,
            }
            .into());
        }
        state.vehicles.push(vehicle.clone());

        info!(
            vehicle_id = %vehicle.id,
            plate = %vehicle.plate_number,
            vehicle_type = %vehicle.vehicle_type,
            "Vehicle registered"
        );
        Ok(vehicle)
    }

    /// Create a registration for an already registered driver
    ///
    /// `expected_slot` overrides the driver's own slot when given. The
    /// vehicle's plate goes through the penalty and dedup checks again, and a
    /// walk-in driver is checked in at the moment the registration is created.
    pub async fn create_registration(
        &self,
        driver: &Driver,
        vehicle: Option<&Vehicle>,
        expected_slot: Option<Timestamp>,
    ) -> Result<Registration> {
        let mut state = self.state.lock().await;
        let now = self.time_provider.now_millis();

        let mut driver = state
            .drivers
            .iter()
            .find(|d| d.id == driver.id)
            .cloned()
            .ok_or_else(|| AppError::from(DomainError::DriverNotFound(driver.id.clone())))?;
        if let Some(vehicle) = vehicle {
            self.check_plate(&state, now, &vehicle.plate_number)?;
        }
        if !driver.is_continuous {
            driver.check_in_time = Some(now);
        }

        let mut next = (*state).clone();
        if let Some(vehicle) = vehicle {
            if !next.vehicles.iter().any(|v| v.id == vehicle.id) {
                next.vehicles.push(vehicle.clone());
            }
        }
        Self::sync_driver(&mut next, &driver);

        let registration = self.build_registration(now, driver, vehicle.cloned(), expected_slot);
        next.registrations.push(registration.clone());
        self.sorter(now).sort(&mut next.registrations);
        self.commit(&mut state, next, Changes::ALL).await?;

        self.announce_registration(&registration);
        Ok(registration)
    }

    /// Validate a gate form and create driver, vehicle and registration together
    ///
    /// Nothing is created when validation, penalty or dedup checks fail.
    pub async fn submit_registration(&self, form: RegistrationForm) -> Result<Registration> {
        let mut state = self.state.lock().await;
        let now = self.time_provider.now_millis();

        validate_form(&form, now, &self.config)?;
        let vehicle = self.admit_vehicle(&state, now, &form.plate_number, form.vehicle_type)?;

        let license_number = form
            .license_number
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_uppercase);
        let driver = self
            .build_driver(
                now,
                &form.driver_name,
                &form.phone_number,
                form.is_continuous,
                form.expected_check_in_time,
            )?
            .with_license_number(license_number);
        let registration = self.build_registration(now, driver.clone(), Some(vehicle.clone()), None);

        let mut next = (*state).clone();
        next.drivers.push(driver);
        next.vehicles.push(vehicle);
        next.registrations.push(registration.clone());
        self.sorter(now).sort(&mut next.registrations);
        self.commit(&mut state, next, Changes::ALL).await?;

        self.announce_registration(&registration);
        Ok(registration)
    }

    fn announce_registration(&self, registration: &Registration) {
        info!(
            registration_id = %registration.id,
            driver_id = %registration.driver.id,
            plate = registration.plate().unwrap_or("-"),
            is_continuous = registration.is_continuous(),
            checked_in = registration.is_checked_in(),
            "Registration created"
        );
        self.events.publish(QueueEvent::Registered {
            registration_id: registration.id.clone(),
            plate: registration.plate().map(str::to_string),
        });
    }

    /// Check a registration in
    ///
    /// Continuous drivers must be inside their window; outside it the attempt
    /// is recorded as a missed check-in and `MissedWindow` is returned.
    pub async fn check_in(&self, registration_id: &str) -> Result<CheckInOutcome> {
        let mut state = self.state.lock().await;
        let now = self.time_provider.now_millis();
        let idx = Self::index_of(&state, registration_id)?;

        let (current_state, is_continuous, in_window, checked_in_at) = {
            let current = &state.registrations[idx];
            (
                current.state(),
                current.is_continuous(),
                can_check_in(current, now, self.config.check_in_window_ms),
                current.check_in_time,
            )
        };

        if current_state == RegistrationState::Dispatched {
            return Err(DomainError::InvalidStateTransition {
                from: current_state.to_string(),
                to: RegistrationState::CheckedIn.to_string(),
            }
            .into());
        }
        if let Some(at) = checked_in_at {
            return Ok(CheckInOutcome::AlreadyCheckedIn { at });
        }

        let mut next = (*state).clone();

        if is_continuous && !in_window {
            let registration = &mut next.registrations[idx];
            registration.mark_missed(now)?;
            let missed_at = registration.missed_check_in_time.unwrap_or(now);
            let expected = registration.expected_check_in_time;

            self.sorter(now).sort(&mut next.registrations);
            self.commit(&mut state, next, Changes::REGISTRATIONS).await?;

            warn!(
                registration_id = %registration_id,
                expected = ?expected,
                attempted_at = now,
                missed_at = missed_at,
                "Check-in outside window recorded as missed"
            );
            self.events.publish(QueueEvent::MissedCheckIn {
                registration_id: registration_id.to_string(),
                at: missed_at,
            });
            return Ok(CheckInOutcome::MissedWindow { missed_at });
        }

        let registration = &mut next.registrations[idx];
        registration.check_in(now)?;
        let driver = registration.driver.clone();
        Self::sync_driver(&mut next, &driver);

        self.sorter(now).sort(&mut next.registrations);
        self.commit(&mut state, next, Changes::ALL).await?;

        info!(
            registration_id = %registration_id,
            driver_id = %driver.id,
            at = now,
            "Registration checked in"
        );
        self.events.publish(QueueEvent::CheckedIn {
            registration_id: registration_id.to_string(),
            at: now,
        });
        Ok(CheckInOutcome::CheckedIn { at: now })
    }

    /// Dispatch a checked-in registration with a trailer and route
    pub async fn dispatch_vehicle(
        &self,
        registration_id: &str,
        trailer_number: &str,
        route: Route,
    ) -> Result<Registration> {
        let mut state = self.state.lock().await;
        let now = self.time_provider.now_millis();
        let idx = Self::index_of(&state, registration_id)?;

        let mut next = (*state).clone();
        let registration = &mut next.registrations[idx];
        registration.dispatch(now, trailer_number, route)?;
        let dispatched = registration.clone();
        Self::sync_driver(&mut next, &dispatched.driver);

        self.sorter(now).sort(&mut next.registrations);
        self.commit(&mut state, next, Changes::ALL).await?;

        let trailer = dispatched.trailer_number.clone().unwrap_or_default();
        info!(
            registration_id = %registration_id,
            trailer_number = %trailer,
            route = %route,
            "Vehicle dispatched"
        );
        self.events.publish(QueueEvent::Dispatched {
            registration_id: registration_id.to_string(),
            trailer_number: trailer,
            at: now,
        });
        Ok(dispatched)
    }

    /// Wipe every collection and snapshot
    ///
    /// Returns `false` and changes nothing when the passphrase does not match.
    /// Memory is always emptied once the passphrase matches; if a snapshot
    /// could not be removed the error is returned and calling again finishes
    /// the wipe.
    pub async fn clear_all_data(&self, passphrase: &str) -> Result<bool> {
        if !self.config.reset_passphrase.verify(passphrase) {
            warn!("Reset rejected: passphrase mismatch");
            return Ok(false);
        }

        let mut state = self.state.lock().await;
        let registrations = self.store.remove(REGISTRATIONS_KEY).await;
        let drivers = self.store.remove(DRIVERS_KEY).await;
        *state = QueueState::default();

        if let Err(e) = registrations.and(drivers) {
            error!(error = %e, "Reset left snapshots behind");
            return Err(e);
        }

        warn!("All queue data cleared");
        self.events.publish(QueueEvent::Reset);
        Ok(true)
    }

    /// Whether the registration's driver may check in right now
    pub async fn can_check_in(&self, registration_id: &str) -> Result<bool> {
        let state = self.state.lock().await;
        let idx = Self::index_of(&state, registration_id)?;
        let now = self.time_provider.now_millis();
        Ok(can_check_in(
            &state.registrations[idx],
            now,
            self.config.check_in_window_ms,
        ))
    }

    pub async fn registration(&self, registration_id: &str) -> Result<Registration> {
        let state = self.state.lock().await;
        let idx = Self::index_of(&state, registration_id)?;
        Ok(state.registrations[idx].clone())
    }

    /// All registrations in dispatch order as of now
    async fn ordered(&self) -> Vec<Registration> {
        let state = self.state.lock().await;
        let mut registrations = state.registrations.clone();
        self.sorter(self.time_provider.now_millis())
            .sort(&mut registrations);
        registrations
    }

    /// Active (not dispatched) registrations in dispatch order
    pub async fn queue(&self) -> Vec<Registration> {
        self.ordered()
            .await
            .into_iter()
            .filter(Registration::is_active)
            .collect()
    }

    /// Registrations still waiting to check in, optionally filtered by plate
    pub async fn pending_check_ins(&self, plate_filter: Option<&str>) -> Vec<Registration> {
        self.ordered()
            .await
            .into_iter()
            .filter(|r| r.is_active() && !r.is_checked_in() && plate_matches(r, plate_filter))
            .collect()
    }

    /// Checked-in registrations ready for dispatch, in dispatch order
    pub async fn dispatch_list(&self) -> Vec<Registration> {
        self.ordered()
            .await
            .into_iter()
            .filter(|r| r.is_active() && r.is_checked_in())
            .collect()
    }

    /// Every registration, newest first, optionally filtered by plate
    pub async fn history(&self, plate_filter: Option<&str>) -> Vec<Registration> {
        let state = self.state.lock().await;
        let mut registrations: Vec<Registration> = state
            .registrations
            .iter()
            .filter(|r| plate_matches(r, plate_filter))
            .cloned()
            .collect();
        registrations.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        registrations
    }

    pub async fn drivers(&self) -> Vec<Driver> {
        self.state.lock().await.drivers.clone()
    }

    pub async fn vehicles(&self) -> Vec<Vehicle> {
        self.state.lock().await.vehicles.clone()
    }
}
