//! Printer and profile models (`examples/original_source/slaicer/models.py`).

use serde::{Deserialize, Serialize};

use crate::filament::Filament;
use crate::ids::{ControllerId, PrinterId};

/// Immutable hardware description, imported once per printer model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterProfile {
    pub name: String,
    pub printer_model: String,
    pub nozzle_diameter: f64,
    /// Bed usable volume in millimeters.
    pub bed_shape: [f64; 3],
    pub base_quality_multiplier: f64,
}

impl PrinterProfile {
    /// Elementwise `piece ≤ bed` after independently sorting each triple,
    /// matching `print_piece_on_printer_check`'s size comparison.
    pub fn fits(&self, piece_size: [f64; 3]) -> bool {
        let mut piece = piece_size;
        let mut bed = self.bed_shape;
        piece.sort_by(|a, b| a.partial_cmp(b).unwrap());
        bed.sort_by(|a, b| a.partial_cmp(b).unwrap());
        (0..3).all(|i| piece[i] <= bed[i])
    }
}

/// A `PrintProfile` is compatible with a `PrinterProfile` iff nozzle diameter and model match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintProfile {
    pub printer_model: String,
    pub nozzle_diameter: f64,
    pub settings: serde_json::Value,
}

impl PrintProfile {
    pub fn compatible_with(&self, profile: &PrinterProfile) -> bool {
        self.printer_model == profile.printer_model && self.nozzle_diameter == profile.nozzle_diameter
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProfile {
    pub bed_temperature: i32,
    pub nozzle_temperature: i32,
}

/// One physical printer: a `PrinterProfile` plus a 1:1 `DeviceController` and loaded filament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    pub name: String,
    pub profile: PrinterProfile,
    pub controller: ControllerId,
    pub filament: Option<Filament>,
    pub disabled: bool,
}

impl Printer {
    /// Compatibility predicate used by the scheduler and dispatcher.
    pub fn compatible(&self, piece_size: Option<[f64; 3]>, print_settings: Option<&PrintProfile>) -> bool {
        if let Some(size) = piece_size {
            if !self.profile.fits(size) {
                return false;
            }
        }
        if let Some(settings) = print_settings {
            if !settings.compatible_with(&self.profile) {
                return false;
            }
        }
        true
    }
}
