//! Materials and colors (`examples/original_source/skynet/models.py`).

use serde::{Deserialize, Serialize};

use crate::ids::FilamentId;

/// A named color with an associated hex swatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub name: String,
    /// 6 hex digits, no leading `#`.
    pub code: String,
}

/// A print material (e.g. "PLA"), carrying the profile defaults it falls back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub density: Option<f64>,
    pub default_bed_temperature: i32,
    pub default_nozzle_temperature: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilamentProvider {
    pub name: String,
    pub telephone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialBrand {
    pub name: String,
    pub providers: Vec<String>,
}

/// Immutable-identity spool definition. Referenced by printers and print jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filament {
    pub id: FilamentId,
    pub name: String,
    pub sku: String,
    pub brand: MaterialBrand,
    pub color: Color,
    pub material: Material,
    pub bed_temperature: Option<i32>,
    pub nozzle_temperature: Option<i32>,
    pub price_per_kg: Option<u32>,
}

impl Filament {
    /// Falls back to the material's default when not overridden on the spool.
    pub fn bed_temperature(&self) -> i32 {
        self.bed_temperature
            .unwrap_or(self.material.default_bed_temperature)
    }

    /// Falls back to the material's default when not overridden on the spool.
    pub fn nozzle_temperature(&self) -> i32 {
        self.nozzle_temperature
            .unwrap_or(self.material.default_nozzle_temperature)
    }

    /// `true` iff this filament's color and material satisfy a piece's requested sets.
    pub fn compatible_with(&self, colors: &[Color], materials: &[Material]) -> bool {
        colors.iter().any(|c| c == &self.color) && materials.iter().any(|m| m == &self.material)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilamentPurchase {
    pub filament: FilamentId,
    pub provider: FilamentProvider,
    pub quantity_kg: f64,
    pub date: chrono::NaiveDate,
}
