//! Groups consecutive track fixes into one polyline per lap.

use std::mem;

use anyhow::{Context, Result};
use geo::{Distance, Haversine};
use geo_types::{Coord, Point};

use crate::track::TrackRow;

// The logger labels the warm-up lap "0" and the cool-down lap "6"; neither
// belongs in the output.
const WARMUP_LAP: &str = "0";
const COOLDOWN_LAP: &str = "6";

/// A completed lap ready to be inserted into the store. Owns its vertices;
/// the accumulator starts over with an empty buffer after handing one out.
#[derive(Debug, PartialEq)]
pub struct LapLine {
    pub lap: i16,
    pub time: Option<String>,
    pub points: Vec<Coord<f64>>,
}

impl LapLine {
    pub fn length_m(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| Haversine::distance(Point::from(w[0]), Point::from(w[1])))
            .sum()
    }
}

#[derive(Debug, Default)]
pub struct LapAccumulator {
    points: Vec<Coord<f64>>,
    lap: Option<String>,
}

impl LapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one row in file order. Data rows are appended to the current lap
    /// with the coordinates swapped to (lon, lat). A boundary row (no `Lap`
    /// value) completes the lap: the buffer is always taken, and a `LapLine`
    /// comes back unless the lap is the warm-up or cool-down or no fix was
    /// accumulated.
    pub fn push(&mut self, row: TrackRow) -> Result<Option<LapLine>> {
        match row.lap {
            Some(lap) => {
                let lat = row.latitude.context("data row without Latitude")?;
                let lon = row.longitude.context("data row without Longitude")?;
                self.points.push(Coord { x: lon, y: lat });
                self.lap = Some(lap);
                Ok(None)
            }
            None => {
                let points = mem::take(&mut self.points);
                let lap = match self.lap.as_deref() {
                    Some(x) => x,
                    // boundary row before any lap id was seen
                    None => return Ok(None),
                };
                if lap == WARMUP_LAP || lap == COOLDOWN_LAP || points.is_empty() {
                    return Ok(None);
                }
                let lap = lap
                    .parse()
                    .with_context(|| format!("lap id {lap:?} is not a number"))?;
                Ok(Some(LapLine {
                    lap,
                    time: row.time,
                    points,
                }))
            }
        }
    }
}
