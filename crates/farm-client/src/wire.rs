//! Wire types for the remote printer-host REST dialect.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct CommandRequest<'a> {
    pub commands: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct PrinterFlags {
    #[serde(default)]
    pub operational: bool,
    #[serde(default)]
    pub printing: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub closed_or_error: bool,
    #[serde(default)]
    pub cancelling: bool,
    #[serde(default)]
    pub finishing: bool,
    #[serde(default)]
    pub pausing: bool,
    #[serde(default)]
    pub resuming: bool,
    #[serde(default)]
    pub sd_ready: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrinterStateResponse {
    pub state: PrinterStateInner,
    pub temperature: Option<TemperatureResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrinterStateInner {
    pub flags: RawFlags,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFlags {
    #[serde(default)]
    pub operational: bool,
    #[serde(default)]
    pub printing: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub ready: bool,
    #[serde(default, rename = "closedOrError")]
    pub closed_or_error: bool,
    #[serde(default)]
    pub cancelling: bool,
    #[serde(default)]
    pub finishing: bool,
    #[serde(default)]
    pub pausing: bool,
    #[serde(default)]
    pub resuming: bool,
    #[serde(default, rename = "sdReady")]
    pub sd_ready: bool,
}

impl From<RawFlags> for PrinterFlags {
    fn from(r: RawFlags) -> Self {
        Self {
            operational: r.operational,
            printing: r.printing,
            paused: r.paused,
            ready: r.ready,
            closed_or_error: r.closed_or_error,
            cancelling: r.cancelling,
            finishing: r.finishing,
            pausing: r.pausing,
            resuming: r.resuming,
            sd_ready: r.sd_ready,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemperatureResponse {
    pub tool0: Option<TemperaturePoint>,
    pub bed: Option<TemperaturePoint>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemperaturePoint {
    pub actual: f64,
}

#[derive(Debug, Default, Clone)]
pub struct Temperatures {
    pub tool: Option<f64>,
    pub bed: Option<f64>,
}

/// Aggregate printer status as the controller cares about it.
#[derive(Debug, Default, Clone)]
pub struct PrinterState {
    pub flags: PrinterFlags,
    pub temperature: Temperatures,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobStateResponse {
    pub job: JobFile,
    pub progress: JobProgress,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobFile {
    pub file: JobFileName,
    #[serde(default, rename = "estimatedPrintTime")]
    pub estimated_print_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobFileName {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobProgress {
    #[serde(default, rename = "printTimeLeft")]
    pub print_time_left: Option<u64>,
}

/// Job state as the controller cares about it.
#[derive(Debug, Clone)]
pub struct JobState {
    pub file_name: Option<String>,
    pub estimated_total_s: Option<u64>,
    pub estimated_left_s: Option<u64>,
}
