//! Orders, pieces and the piece → unit-piece → print-job lineage.
//!
//! Derived counters (`completed`/`pending`/`queued`) are never stored; they
//! are always recomputed from the `UnitPiece` set, per the "derived/reactive
//! fields" design note: no hidden behavior in constructors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::filament::{Color, Material};
use crate::ids::{PieceId, PrintJobId, UnitPieceId};
use crate::ids::OrderId;
use crate::job::PrintJob;
use crate::printer::PrintProfile;
use crate::slice::{GeometryModel, SliceJob};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client: String,
    pub due_date: NaiveDate,
    /// 0..=5.
    pub priority: u8,
}

/// External parse-quote result for a piece that already carries a ready program
/// (no geometry/slice step needed), mirroring `slaicer`'s `Gcode` model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramQuote {
    pub ready: bool,
    pub build_time_s: Option<u64>,
    pub weight_g: Option<f64>,
}

/// A piece is either a geometry model awaiting slicing, or an already-ready program.
/// Exactly one of the two, enforced by construction rather than by a runtime check
/// over two optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PieceSource {
    Geometry {
        model: GeometryModel,
        quote: SliceJob,
    },
    Program {
        file_name: String,
        quote: ProgramQuote,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub order: OrderId,
    pub source: PieceSource,
    pub copies: u32,
    pub scale: f64,
    pub materials: Vec<Material>,
    pub colors: Vec<Color>,
    pub print_settings: Option<PrintProfile>,
    pub cancelled: bool,
}

impl Piece {
    /// Validates the `validate_piece` invariant the reference system enforces
    /// on save: a piece needs at least one color and one material before it's
    /// accepted, otherwise it can never match a filament and would sit
    /// placeable forever without ever printing.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PieceId,
        order: OrderId,
        source: PieceSource,
        copies: u32,
        scale: f64,
        materials: Vec<Material>,
        colors: Vec<Color>,
        print_settings: Option<PrintProfile>,
    ) -> Result<Self, CoreError> {
        if materials.is_empty() || colors.is_empty() {
            return Err(CoreError::MissingColorOrMaterial);
        }
        Ok(Self {
            id,
            order,
            source,
            copies,
            scale,
            materials,
            colors,
            print_settings,
            cancelled: false,
        })
    }

    pub fn quote_ready(&self) -> bool {
        match &self.source {
            PieceSource::Geometry { quote, .. } => quote.ready(),
            PieceSource::Program { quote, .. } => quote.ready,
        }
    }

    /// Defined only when `quote_ready()`.
    pub fn build_time(&self) -> Option<u64> {
        if !self.quote_ready() {
            return None;
        }
        match &self.source {
            PieceSource::Geometry { quote, .. } => quote.build_time(),
            PieceSource::Program { quote, .. } => quote.build_time_s,
        }
    }

    /// Defined only when `quote_ready()`.
    pub fn weight(&self) -> Option<f64> {
        if !self.quote_ready() {
            return None;
        }
        match &self.source {
            PieceSource::Geometry { quote, .. } => quote.weight(),
            PieceSource::Program { quote, .. } => quote.weight_g,
        }
    }

    pub fn geometry_size(&self) -> Option<[f64; 3]> {
        match &self.source {
            PieceSource::Geometry { model, .. } => Some(model.size_xyz),
            PieceSource::Program { .. } => None,
        }
    }

    /// Seconds until the parent order's due date, clamped to at least 1.
    pub fn deadline_from_now(&self, order: &Order, now: chrono::DateTime<chrono::Utc>) -> i64 {
        let due = order
            .due_date
            .and_hms_opt(0, 0, 0)
            .expect("midnight always valid")
            .and_utc();
        (due - now).num_seconds().max(1)
    }

    /// Number of unit pieces whose job succeeded.
    pub fn completed(&self, unit_pieces: &[UnitPiece], jobs: &[PrintJob]) -> usize {
        unit_pieces
            .iter()
            .filter(|up| up.piece == self.id)
            .filter(|up| job_for(up, jobs).is_some_and(|j| j.success == Some(true)))
            .count()
    }

    /// Number of unit pieces whose job is still printing or awaiting confirmation.
    pub fn pending(&self, unit_pieces: &[UnitPiece], jobs: &[PrintJob]) -> usize {
        unit_pieces
            .iter()
            .filter(|up| up.piece == self.id)
            .filter(|up| job_for(up, jobs).is_some_and(|j| j.pending()))
            .count()
    }

    pub fn queued(&self, unit_pieces: &[UnitPiece], jobs: &[PrintJob]) -> i64 {
        self.copies as i64
            - self.completed(unit_pieces, jobs) as i64
            - self.pending(unit_pieces, jobs) as i64
    }

    /// `quote.ready ∧ ¬cancelled ∧ queued>0`.
    pub fn placeable(&self, unit_pieces: &[UnitPiece], jobs: &[PrintJob]) -> bool {
        self.quote_ready() && !self.cancelled && self.queued(unit_pieces, jobs) > 0
    }
}

fn job_for<'a>(up: &UnitPiece, jobs: &'a [PrintJob]) -> Option<&'a PrintJob> {
    jobs.iter().find(|j| j.id == up.job)
}

/// Created when a print job is launched to satisfy one copy of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPiece {
    pub id: UnitPieceId,
    pub piece: PieceId,
    pub job: PrintJobId,
}
