#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Runtime control loop: per-printer controllers, the scheduler/dispatcher
//! pair and the periodic services that tie them together.

pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod periodic;
pub mod scheduler;
pub mod state;
pub mod task_runner;

pub use controller::{ControllerRuntime, StatusCache};
pub use error::{ControllerError, DispatcherError, SchedulerError};
pub use state::FarmState;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use farm_client::DeviceClient;
    use farm_core::{
        Color, Filament, Material, MaterialBrand, Piece, PieceSource, Printer, PrinterProfile,
        ProgramQuote,
    };
    use tokio::sync::RwLock;

    use crate::controller::ControllerRuntime;
    use crate::state::FarmState;

    fn test_filament() -> Filament {
        Filament {
            id: farm_core::FilamentId::new(),
            name: "test PLA".to_string(),
            sku: "PLA-001".to_string(),
            brand: MaterialBrand {
                name: "acme".to_string(),
                providers: vec![],
            },
            color: Color {
                name: "black".to_string(),
                code: "000000".to_string(),
            },
            material: Material {
                name: "PLA".to_string(),
                density: Some(1.24),
                default_bed_temperature: 60,
                default_nozzle_temperature: 210,
            },
            bed_temperature: None,
            nozzle_temperature: None,
            price_per_kg: None,
        }
    }

    fn ready_piece(order: farm_core::OrderId, filament: &Filament) -> Piece {
        Piece {
            id: farm_core::PieceId::new(),
            order,
            source: PieceSource::Program {
                file_name: "part.gcode".to_string(),
                quote: ProgramQuote {
                    ready: true,
                    build_time_s: Some(600),
                    weight_g: Some(12.0),
                },
            },
            copies: 1,
            scale: 1.0,
            materials: vec![filament.material.clone()],
            colors: vec![filament.color.clone()],
            print_settings: None,
            cancelled: false,
        }
    }

    #[tokio::test]
    async fn scheduler_and_dispatcher_place_a_ready_piece() {
        let mut state = FarmState::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        let order = farm_core::Order {
            id: farm_core::OrderId::new(),
            client: "acme".to_string(),
            due_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            priority: 3,
        };
        let filament = test_filament();
        let piece = ready_piece(order.id, &filament);

        let controller_id = farm_core::ControllerId::new();
        let client = DeviceClient::new(
            "http://127.0.0.1:9999".parse().unwrap(),
            "test-key".to_string(),
        );
        let printer = Printer {
            id: farm_core::PrinterId::new(),
            name: "printer-1".to_string(),
            profile: PrinterProfile {
                name: "ender".to_string(),
                printer_model: "ender3".to_string(),
                nozzle_diameter: 0.4,
                bed_shape: [220.0, 220.0, 250.0],
                base_quality_multiplier: 1.0,
            },
            controller: controller_id,
            filament: Some(filament.clone()),
            disabled: false,
        };

        let printer_id = printer.id;
        state.orders.insert(order.id, order);
        state.filaments.insert(filament.id, filament);
        state.pieces.insert(piece.id, piece);
        state.printers.insert(printer.id, printer);
        state
            .controllers
            .insert(controller_id, ControllerRuntime::new(printer_id, client));

        // Connection ready is required for the dispatcher's downstream
        // promotion; the scheduler itself only needs an enabled printer.
        if let Some(ctrl) = state.controllers.get_mut(&controller_id) {
            ctrl.status.flags.ready = true;
        }

        let pieces = state.placeable_pieces();
        assert_eq!(pieces.len(), 1);
        let printers = state.enabled_printers();
        assert_eq!(printers.len(), 1);

        let config = farm_core::Configuration::default();
        let busy_until = std::collections::HashMap::new();
        let schedule = crate::scheduler::build_schedule(
            &pieces,
            &state.unit_pieces,
            &state.print_jobs_slice(),
            &printers,
            &state.orders,
            &busy_until,
            &config,
            now,
        )
        .expect("at least one printer is available");
        assert_eq!(schedule.entries.len(), 1);
        assert_eq!(schedule.status, farm_core::SolverStatus::Optimal);

        state.schedules.push(schedule);
        let launched = crate::dispatcher::dispatch_due(&mut state, now + chrono::Duration::seconds(1))
            .expect("dispatch succeeds with a compatible filament");
        assert_eq!(launched.len(), 1);
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.print_jobs.len(), 1);
        assert_eq!(state.unit_pieces.len(), 1);

        let state = Arc::new(RwLock::new(state));
        assert_eq!(state.read().await.tasks.len(), 1);
    }
}
