//! The output feature collection: a polyline shapefile plus its sidecars.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polyline, Writer};
use thiserror::Error;

use crate::laps::LapLine;

pub const LAYER_NAME: &str = "tracklines";

const LAP_FIELD: &str = "LAPS";
const TIME_FIELD: &str = "LapTime";

// The fixed geographic reference of the collection, written as a .prj
// sidecar next to the shapefile.
const WGS_84_WKT: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",\
SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],\
UNIT[\"Degree\",0.0174532925199433]]";

/// Errors coming out of the storage engine. The convert pipeline recovers
/// from exactly this type; anything else is fatal to it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lap {lap} has {points} vertices, a polyline part needs at least 2")]
    DegenerateLine { lap: i16, points: usize },
    #[error("shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct TrackStore {
    writer: Writer<BufWriter<File>>,
    path: PathBuf,
}

impl TrackStore {
    /// Delete any previous `tracklines` collection in the workspace, then
    /// create a fresh one with the lap number and lap time fields declared.
    pub fn create(workspace: &Path) -> Result<Self, StoreError> {
        let path = workspace.join(format!("{LAYER_NAME}.shp"));
        for ext in ["shp", "shx", "dbf", "prj"] {
            let sidecar = path.with_extension(ext);
            if sidecar.exists() {
                fs::remove_file(sidecar)?;
            }
        }

        let table = TableWriterBuilder::new()
            .add_numeric_field(FieldName::try_from(LAP_FIELD).unwrap(), 6, 0)
            .add_character_field(FieldName::try_from(TIME_FIELD).unwrap(), 32);
        let writer = Writer::from_path(&path, table)?;
        fs::write(path.with_extension("prj"), WGS_84_WKT)?;

        Ok(Self { writer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one polyline record with its lap number and lap time.
    pub fn insert(&mut self, line: &LapLine) -> Result<(), StoreError> {
        if line.points.len() < 2 {
            return Err(StoreError::DegenerateLine {
                lap: line.lap,
                points: line.points.len(),
            });
        }

        let points = line.points.iter().map(|c| Point::new(c.x, c.y)).collect();
        let shape = Polyline::new(points);

        let mut record = Record::default();
        record.insert(
            LAP_FIELD.to_string(),
            FieldValue::Numeric(Some(line.lap as f64)),
        );
        record.insert(
            TIME_FIELD.to_string(),
            FieldValue::Character(line.time.clone()),
        );

        self.writer.write_shape_and_record(&shape, &record)?;
        Ok(())
    }

    /// Release the writer, finalizing the shapefile headers. Runs on the
    /// normal path even after a caught engine error, so everything inserted
    /// so far is kept.
    pub fn finish(self) -> Result<(), StoreError> {
        drop(self.writer);
        Ok(())
    }
}
