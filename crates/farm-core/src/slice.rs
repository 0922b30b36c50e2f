//! External slicing/quoting collaborator, kept as a thin black-box contract
//! (`examples/original_source/slaicer/models.py`). The core never inspects
//! mesh data or G-code; it only reads back these handles.

use serde::{Deserialize, Serialize};

use crate::ids::SliceJobId;
use crate::printer::{MaterialProfile, PrintProfile, PrinterProfile};

/// Opaque handle to an uploaded mesh. The only fields the scheduler reads are
/// the oriented bounding-box dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryModel {
    pub id: uuid::Uuid,
    pub size_xyz: [f64; 3],
}

/// Ad-hoc configuration a dispatcher assembles before handing work to the
/// external slicer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceConfiguration {
    pub printer_profile: PrinterProfile,
    pub material_profile: MaterialProfile,
    pub print_profile: Option<PrintProfile>,
    pub auto_print_profile: bool,
    pub auto_support: bool,
}

/// External job converting a geometry model + profile into a print program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceJob {
    pub id: SliceJobId,
    pub configuration: SliceConfiguration,
    pub geometry_models: Vec<GeometryModel>,
    pub save_program: bool,
    pub ready: bool,
    pub estimated_build_time_s: Option<u64>,
    pub estimated_weight_g: Option<f64>,
    pub program_file: Option<String>,
    pub error_log: Option<String>,
}

impl SliceJob {
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Defined only once `ready()`; callers must check first.
    pub fn build_time(&self) -> Option<u64> {
        self.ready.then_some(self.estimated_build_time_s).flatten()
    }

    pub fn weight(&self) -> Option<f64> {
        self.ready.then_some(self.estimated_weight_g).flatten()
    }

    /// Estimate used by the scheduler while the job has not finished slicing yet.
    pub fn estimated_build_time(&self) -> u64 {
        self.estimated_build_time_s.unwrap_or(0)
    }
}
