#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Data model for the print-farm coordinator: entities, invariants and the
//! pure derived-field logic that sits on top of them. No I/O lives here.

pub mod config;
pub mod error;
pub mod filament;
pub mod ids;
pub mod job;
pub mod order;
pub mod printer;
pub mod schedule;
pub mod slice;
pub mod task;

pub use config::{Configuration, ForbiddenZone};
pub use error::CoreError;
pub use filament::{Color, Filament, FilamentProvider, FilamentPurchase, Material, MaterialBrand};
pub use ids::{
    ControllerId, FilamentChangeId, FilamentId, OrderId, PieceId, PrintJobId, PrinterId,
    ScheduleEntryId, ScheduleId, SliceJobId, TaskId, UnitPieceId,
};
pub use job::{FilamentChange, PrintJob, FILAMENT_CHANGE_MEAN_DURATION_S};
pub use order::{Order, Piece, PieceSource, ProgramQuote, UnitPiece};
pub use printer::{MaterialProfile, PrintProfile, Printer, PrinterProfile};
pub use schedule::{Schedule, ScheduleEntry, ScheduleSubject, SolverStatus};
pub use slice::{GeometryModel, SliceConfiguration, SliceJob};
pub use task::{DeviceTask, ProgramSource, TaskKind, TaskStatus};
