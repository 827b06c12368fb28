//! The conversion pipeline: GPS track log in, polyline shapefile out.

use std::fs::{self, File};

use anyhow::{Context, Result};
use log::{error, info};
use serde::Serialize;

use crate::config::Config;
use crate::laps::{LapAccumulator, LapLine};
use crate::store::{StoreError, TrackStore, LAYER_NAME};
use crate::track::TrackRow;

#[derive(Debug, Default, Serialize)]
struct Stats {
    total_laps: i64,
    total_points: i64,
}

pub fn run(config: &Config) -> Result<()> {
    let mut store = TrackStore::create(&config.workspace)?;
    let mut reader = open_log(config)?;

    let mut stats = Stats::default();
    if let Err(e) = write_laps(&mut reader, &mut store, &mut stats) {
        match e.downcast::<StoreError>() {
            // engine failure: log it, keep what was already inserted
            Ok(engine) => error!("stopping insert: {engine}"),
            Err(other) => return Err(other),
        }
    }
    store.finish()?;
    info!(
        "{LAYER_NAME} written: {} laps, {} points",
        stats.total_laps, stats.total_points
    );

    if let Some(path) = config.stats.as_deref() {
        let data = serde_json::to_string_pretty(&stats)?;
        fs::write(path, data)?;
    }

    Ok(())
}

/// Dry run: parse the whole log and report the laps that `convert` would
/// write, without touching the workspace.
pub fn check(config: &Config) -> Result<()> {
    let mut reader = open_log(config)?;

    let mut laps = LapAccumulator::new();
    let mut total = 0;
    for result in reader.deserialize() {
        let row: TrackRow = result?;
        if let Some(line) = laps.push(row)? {
            println!("{}", describe(&line));
            total += 1;
        }
    }
    println!("{total} laps would be written");

    Ok(())
}

fn open_log(config: &Config) -> Result<csv::Reader<File>> {
    csv::Reader::from_path(&config.input_csv)
        .with_context(|| format!("Failed to open {}", config.input_csv.display()))
}

fn write_laps(
    reader: &mut csv::Reader<File>,
    store: &mut TrackStore,
    stats: &mut Stats,
) -> Result<()> {
    let mut laps = LapAccumulator::new();
    for result in reader.deserialize() {
        let row: TrackRow = result?;
        if let Some(line) = laps.push(row)? {
            store.insert(&line)?;
            info!("{}", describe(&line));
            stats.total_laps += 1;
            stats.total_points += line.points.len() as i64;
        }
    }
    Ok(())
}

fn describe(line: &LapLine) -> String {
    format!(
        "lap {}: {} points, {:.2} km, time {}",
        line.lap,
        line.points.len(),
        line.length_m() / 1000.0,
        line.time.as_deref().unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use shapefile::dbase::{self, FieldValue};
    use shapefile::Polyline;
    use tempdir::TempDir;

    use super::*;

    const SAMPLE: &str = "Lap,Latitude,Longitude,Time\n\
                          0,-34.840,150.550,\n\
                          ,,,00:41.3\n\
                          1,-34.841,150.551,\n\
                          1,-34.842,150.552,\n\
                          ,,,00:59.1\n\
                          2,-34.843,150.553,\n\
                          2,-34.844,150.554,\n\
                          2,-34.845,150.555,\n\
                          ,,,01:01.8\n\
                          6,-34.846,150.556,\n\
                          ,,,00:12.0\n";

    fn config_in(dir: &Path, csv_data: &str) -> Config {
        let input_csv = dir.join("track.csv");
        fs::write(&input_csv, csv_data).unwrap();
        Config {
            input_csv,
            workspace: dir.to_path_buf(),
            stats: None,
        }
    }

    fn read_features(dir: &Path) -> Vec<(Polyline, dbase::Record)> {
        let mut reader =
            shapefile::Reader::from_path(dir.join(format!("{LAYER_NAME}.shp"))).unwrap();
        reader
            .iter_shapes_and_records_as::<Polyline, dbase::Record>()
            .map(|x| x.unwrap())
            .collect()
    }

    fn lap_of(record: &dbase::Record) -> f64 {
        match record.get("LAPS").unwrap() {
            FieldValue::Numeric(Some(x)) => *x,
            other => panic!("unexpected LAPS value: {other:?}"),
        }
    }

    #[test]
    fn converts_track_log() {
        let dir = TempDir::new("convert").unwrap();
        let config = config_in(dir.path(), SAMPLE);
        run(&config).unwrap();

        let features = read_features(dir.path());
        assert_eq!(features.len(), 2);

        let (shape, record) = &features[0];
        assert_eq!(lap_of(record), 1.0);
        let points = &shape.parts()[0];
        assert_eq!(points.len(), 2);
        // (lon, lat), in file order
        assert_eq!((points[0].x, points[0].y), (150.551, -34.841));
        assert_eq!((points[1].x, points[1].y), (150.552, -34.842));
        match record.get("LapTime").unwrap() {
            FieldValue::Character(Some(x)) => assert_eq!(x, "00:59.1"),
            other => panic!("unexpected LapTime value: {other:?}"),
        }

        let (shape, record) = &features[1];
        assert_eq!(lap_of(record), 2.0);
        assert_eq!(shape.parts()[0].len(), 3);
    }

    #[test]
    fn rerun_is_idempotent() {
        let dir = TempDir::new("convert").unwrap();
        let config = config_in(dir.path(), SAMPLE);

        run(&config).unwrap();
        let shp = fs::read(dir.path().join(format!("{LAYER_NAME}.shp"))).unwrap();
        let dbf = fs::read(dir.path().join(format!("{LAYER_NAME}.dbf"))).unwrap();

        run(&config).unwrap();
        assert_eq!(shp, fs::read(dir.path().join(format!("{LAYER_NAME}.shp"))).unwrap());
        assert_eq!(dbf, fs::read(dir.path().join(format!("{LAYER_NAME}.dbf"))).unwrap());
    }

    #[test]
    fn header_only_input() {
        let dir = TempDir::new("convert").unwrap();
        let config = config_in(dir.path(), "Lap,Latitude,Longitude,Time\n");
        run(&config).unwrap();

        assert!(dir.path().join(format!("{LAYER_NAME}.prj")).exists());
        assert_eq!(read_features(dir.path()).len(), 0);
    }

    #[test]
    fn engine_error_keeps_prior_laps() {
        let dir = TempDir::new("convert").unwrap();
        // lap 2 has a single fix, an invalid polyline; lap 3 is never reached
        let config = config_in(
            dir.path(),
            "Lap,Latitude,Longitude,Time\n\
             1,-34.841,150.551,\n\
             1,-34.842,150.552,\n\
             ,,,00:59.1\n\
             2,-34.843,150.553,\n\
             ,,,01:01.8\n\
             3,-34.844,150.554,\n\
             3,-34.845,150.555,\n\
             ,,,00:58.2\n",
        );
        run(&config).unwrap();

        let features = read_features(dir.path());
        assert_eq!(features.len(), 1);
        assert_eq!(lap_of(&features[0].1), 1.0);
    }

    #[test]
    fn parse_error_is_fatal() {
        let dir = TempDir::new("convert").unwrap();
        let config = config_in(
            dir.path(),
            "Lap,Latitude,Longitude,Time\n\
             1,not-a-number,150.551,\n",
        );
        assert!(run(&config).is_err());
    }

    #[test]
    fn writes_stats_file() {
        let dir = TempDir::new("convert").unwrap();
        let mut config = config_in(dir.path(), SAMPLE);
        config.stats = Some(dir.path().join("stats.json"));
        run(&config).unwrap();

        let data = fs::read_to_string(config.stats.unwrap()).unwrap();
        let stats: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(stats["total_laps"], 2);
        assert_eq!(stats["total_points"], 5);
    }

    #[test]
    fn check_writes_nothing() {
        let dir = TempDir::new("convert").unwrap();
        let config = config_in(dir.path(), SAMPLE);
        check(&config).unwrap();
        assert!(!dir.path().join(format!("{LAYER_NAME}.shp")).exists());
    }
}
