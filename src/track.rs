//! Serde types for the GPS track log.

use serde::Deserialize;

/// One row of the track log. Data rows carry a lap id and a fix; lap-boundary
/// rows leave `Lap` empty and carry the elapsed lap time instead. The logger
/// writes more telemetry columns than these, they are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackRow {
    pub lap: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time: Option<String>,
}
