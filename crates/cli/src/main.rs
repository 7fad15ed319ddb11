//! TruckQ CLI - gate-side front end for the truck queue
//!
//! Each invocation opens the queue database, runs one command and exits.

mod output;
mod slot;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use truckq_core::application::constants::DEFAULT_RESET_PASSPHRASE;
use truckq_core::application::{CheckInOutcome, QueueConfig, QueueService, RegistrationForm};
use truckq_core::domain::{DomainError, Route, VehicleType};
use truckq_core::port::{SystemTimeProvider, TimeProvider, UuidProvider};
use truckq_core::AppError;
use truckq_infra_sqlite::{create_pool, run_migrations, SqliteSnapshotStore};

const DEFAULT_DB_PATH: &str = "~/.truckq/queue.db";

#[derive(Parser)]
#[command(name = "truckq")]
#[command(about = "Truck queue: registration, check-in and dispatch", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file
    #[arg(long, env = "TRUCKQ_DB_PATH", default_value = DEFAULT_DB_PATH, global = true)]
    db_path: String,

    /// UTC offset for calendar days and slots (e.g. +08:00)
    #[arg(
        long,
        env = "TRUCKQ_UTC_OFFSET",
        default_value = "+00:00",
        value_parser = slot::parse_utc_offset,
        allow_hyphen_values = true,
        global = true
    )]
    utc_offset: i32,

    /// Passphrase that guards `reset`
    #[arg(
        long,
        env = "TRUCKQ_RESET_PASSPHRASE",
        default_value = DEFAULT_RESET_PASSPHRASE,
        hide_default_value = true,
        hide_env_values = true,
        global = true
    )]
    reset_passphrase: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a driver and vehicle at the gate
    Register {
        /// Driver name
        #[arg(long)]
        name: String,

        /// Driver phone number
        #[arg(long)]
        phone: String,

        /// Driving license number
        #[arg(long)]
        license: Option<String>,

        /// Vehicle plate number
        #[arg(long)]
        plate: String,

        /// Vehicle type (normal, refrigerated, dangerous)
        #[arg(long = "vehicle-type", default_value = "normal")]
        vehicle_type: VehicleType,

        /// Booked slot as HH:MM; makes the driver continuous
        #[arg(long, value_name = "HH:MM")]
        slot: Option<String>,
    },

    /// Check a continuous driver in
    CheckIn {
        /// Registration ID
        registration_id: String,
    },

    /// Assign a trailer and send the vehicle out
    Dispatch {
        /// Registration ID
        registration_id: String,

        /// Trailer number
        #[arg(short, long)]
        trailer: String,

        /// Route (city-delivery, regional, long-haul)
        #[arg(short, long, default_value = "regional")]
        route: Route,
    },

    /// Show the active queue in dispatch order
    Queue,

    /// Show registrations still waiting for check-in
    Pending {
        /// Filter by plate (substring, case-insensitive)
        #[arg(long)]
        plate: Option<String>,
    },

    /// Show checked-in vehicles awaiting dispatch
    DispatchList,

    /// Show every registration, newest first
    History {
        /// Filter by plate (substring, case-insensitive)
        #[arg(long)]
        plate: Option<String>,
    },

    /// Delete all queue data
    Reset {
        /// Reset passphrase
        passphrase: String,
    },
}

fn init_logging() -> Result<()> {
    let log_format = std::env::var("TRUCKQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("truckq=info"))
        .context("Failed to create env filter")?;

    // Logs go to stderr; stdout carries the tables
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

async fn open_queue(cli: &Cli, time_provider: Arc<dyn TimeProvider>) -> Result<QueueService> {
    let db_path = shellexpand::tilde(&cli.db_path).into_owned();
    if let Some(parent) = Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    info!(db_path = %db_path, "Opening queue database");

    let pool = create_pool(&db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    let store = Arc::new(SqliteSnapshotStore::new(pool, time_provider.clone()));
    let config = QueueConfig::default()
        .with_utc_offset_secs(cli.utc_offset)
        .with_reset_passphrase(cli.reset_passphrase.clone());

    QueueService::load(store, Arc::new(UuidProvider), time_provider, config)
        .await
        .context("Failed to load queue state")
}

/// Rewrite plate rejections with readable times
fn explain(err: AppError, config: &QueueConfig) -> anyhow::Error {
    let offset = config.utc_offset();
    match err {
        AppError::Domain(DomainError::VehicleInPenalty { plate, until }) => anyhow::anyhow!(
            "{} missed a check-in and cannot register until {}",
            plate,
            output::format_time(until, &offset)
        ),
        AppError::Domain(DomainError::VehicleAlreadyRegistered {
            plate,
            registered_at,
        }) => anyhow::anyhow!(
            "{} was already registered at {}; one registration per {} hours",
            plate,
            output::format_time(registered_at, &offset),
            config.dedup_ms / 3_600_000
        ),
        other => anyhow::Error::new(other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let service = open_queue(&cli, time_provider.clone()).await?;
    let config = service.config().clone();
    let offset = config.utc_offset();

    match cli.command {
        Commands::Register {
            name,
            phone,
            license,
            plate,
            vehicle_type,
            slot: booked_slot,
        } => {
            let form = match booked_slot {
                Some(input) => {
                    let expected = slot::resolve_slot(&input, time_provider.now_millis(), &offset)?;
                    RegistrationForm::continuous(name, phone, plate, vehicle_type, expected)
                }
                None => RegistrationForm::walk_in(name, phone, plate, vehicle_type),
            };
            let form = RegistrationForm {
                license_number: license,
                ..form
            };

            let registration = service
                .submit_registration(form)
                .await
                .map_err(|e| explain(e, &config))?;

            println!("{}", "✓ Registration created".green().bold());
            println!();
            println!("  {} {}", "Registration:".bold(), registration.id);
            println!("  {} {}", "Plate:".bold(), registration.plate().unwrap_or("-"));
            match registration.expected_check_in_time {
                Some(expected) => {
                    println!(
                        "  {} {} ({})",
                        "Slot:".bold(),
                        output::format_time(expected, &offset),
                        registration.slot_label(&offset).unwrap_or_default()
                    );
                    println!(
                        "  {} check in within {} minutes of the slot",
                        "Note:".bold(),
                        config.check_in_window_ms / 60_000
                    );
                }
                None => println!("  {} {}", "Status:".bold(), "CHECKED IN (walk-in)".green()),
            }
        }

        Commands::CheckIn { registration_id } => {
            match service.check_in(&registration_id).await? {
                CheckInOutcome::CheckedIn { at } => {
                    println!(
                        "{}",
                        format!(
                            "✓ {} checked in at {}",
                            registration_id,
                            output::format_time(at, &offset)
                        )
                        .green()
                        .bold()
                    );
                }
                CheckInOutcome::AlreadyCheckedIn { at } => {
                    println!(
                        "{}",
                        format!(
                            "○ {} was already checked in at {}",
                            registration_id,
                            output::format_time(at, &offset)
                        )
                        .yellow()
                    );
                }
                CheckInOutcome::MissedWindow { missed_at } => {
                    let registration = service.registration(&registration_id).await?;
                    println!("{}", "✗ Outside the check-in window".red().bold());
                    println!(
                        "  {} {}",
                        "Slot:".bold(),
                        registration.slot_label(&offset).unwrap_or_else(|| "-".to_string())
                    );
                    println!(
                        "  {} {}",
                        "Recorded as missed at:".bold(),
                        output::format_time(missed_at, &offset)
                    );
                    println!(
                        "  {} {}",
                        "Plate blocked until:".bold(),
                        output::format_time(missed_at + config.penalty_ms, &offset)
                    );
                }
            }
        }

        Commands::Dispatch {
            registration_id,
            trailer,
            route,
        } => {
            let registration = service
                .dispatch_vehicle(&registration_id, &trailer, route)
                .await?;

            println!("{}", "✓ Vehicle dispatched".green().bold());
            println!();
            println!("  {} {}", "Registration:".bold(), registration.id);
            println!(
                "  {} {}",
                "Trailer:".bold(),
                registration.trailer_number.as_deref().unwrap_or("-")
            );
            println!("  {} {}", "Route:".bold(), route.label());
            if let Some(eta) = registration.estimated_arrival() {
                println!("  {} {}", "ETA:".bold(), output::format_time(eta, &offset));
            }
        }

        Commands::Queue => {
            let registrations = service.queue().await;
            println!("{}", format!("Queue ({})", registrations.len()).cyan().bold());
            println!("{}", output::queue_table(&registrations, &config));
        }

        Commands::Pending { plate } => {
            let registrations = service.pending_check_ins(plate.as_deref()).await;
            println!(
                "{}",
                format!("Awaiting check-in ({})", registrations.len()).cyan().bold()
            );
            println!(
                "{}",
                output::pending_table(&registrations, &config, time_provider.now_millis())
            );
        }

        Commands::DispatchList => {
            let registrations = service.dispatch_list().await;
            println!(
                "{}",
                format!("Ready for dispatch ({})", registrations.len()).cyan().bold()
            );
            println!(
                "{}",
                output::dispatch_table(&registrations, &config, time_provider.now_millis())
            );
        }

        Commands::History { plate } => {
            let registrations = service.history(plate.as_deref()).await;
            println!("{}", format!("History ({})", registrations.len()).cyan().bold());
            println!("{}", output::history_table(&registrations, &config));
        }

        Commands::Reset { passphrase } => {
            if !service.clear_all_data(&passphrase).await? {
                bail!("Passphrase mismatch; nothing was cleared");
            }
            println!("{}", "✓ All queue data cleared".green().bold());
        }
    }

    Ok(())
}
