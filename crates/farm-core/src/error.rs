//! Error taxonomy for the data-model crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("piece must have exactly one of {{geometry model, ready program}}")]
    InvalidPieceSource,

    #[error("piece requires at least one color and one material")]
    MissingColorOrMaterial,

    #[error("no compatible filament available for this piece")]
    FilamentUnavailable,
}
