//! CSV records of realization fields and interference patterns.
//!
//! A record starts with one `# ` line holding a JSON header (the grid, and for patterns the metadata and the
//! realization count), followed by a CSV table with a header row. Floats are written in their shortest round-trip
//! form, so reading a record back reproduces every value bit for bit.

use std::io::{self, BufRead, BufReader, Write};

use ndarray::Array1;
use num_complex::Complex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};
use crate::grid::SamplingGrid;
use crate::pattern::{InterferencePattern, PatternMetadata};
use crate::Field;

#[derive(Serialize, Deserialize)]
struct RealizationHeader {
    grid: SamplingGrid,
}

#[derive(Serialize, Deserialize)]
struct PatternHeader {
    grid: SamplingGrid,
    metadata: PatternMetadata,
    realizations: usize,
}

#[derive(Serialize, Deserialize)]
struct RealizationRow {
    x_cm: f64,
    re: f64,
    im: f64,
}

#[derive(Serialize, Deserialize)]
struct PatternRow {
    x_cm: f64,
    intensity: f64,
    profile: Option<f64>,
}

pub fn write_realization<W: Write>(writer: W, field: &Field) -> Result<()> {
    let header = RealizationHeader { grid: field.grid };
    let mut csv = begin(writer, &header)?;
    for (i, e) in field.values.iter().enumerate() {
        csv.serialize(RealizationRow {
            x_cm: field.grid.position(i),
            re: e.re,
            im: e.im,
        })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn read_realization<R: io::Read>(reader: R) -> Result<Field> {
    let (header, rows): (RealizationHeader, Vec<RealizationRow>) = load(reader)?;
    let grid = checked_grid(header.grid)?;
    check_positions(&grid, rows.iter().map(|r| r.x_cm))?;
    let values: Array1<Complex<f64>> = rows.iter().map(|r| Complex::new(r.re, r.im)).collect();
    Field::new(values, grid)
}

pub fn write_pattern<W: Write>(writer: W, pattern: &InterferencePattern) -> Result<()> {
    let header = PatternHeader {
        grid: pattern.grid,
        metadata: pattern.metadata,
        realizations: pattern.realizations,
    };
    let mut csv = begin(writer, &header)?;
    for (i, &intensity) in pattern.intensity.iter().enumerate() {
        csv.serialize(PatternRow {
            x_cm: pattern.grid.position(i),
            intensity,
            profile: pattern.profile.as_ref().map(|p| p[i]),
        })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn read_pattern<R: io::Read>(reader: R) -> Result<InterferencePattern> {
    let (header, rows): (PatternHeader, Vec<PatternRow>) = load(reader)?;
    let grid = checked_grid(header.grid)?;
    check_positions(&grid, rows.iter().map(|r| r.x_cm))?;
    if header.realizations == 0 {
        return Err(Error::MalformedRecord(
            "a pattern must average at least one realization".to_string(),
        ));
    }

    let intensity: Array1<f64> = rows.iter().map(|r| r.intensity).collect();
    let profile: Option<Array1<f64>> = match rows.iter().filter(|r| r.profile.is_some()).count() {
        0 => None,
        n if n == rows.len() => Some(rows.iter().filter_map(|r| r.profile).collect()),
        n => {
            return Err(Error::MalformedRecord(format!(
                "profile given for {} of {} rows",
                n,
                rows.len()
            )))
        }
    };
    InterferencePattern::new(grid, intensity, profile, header.metadata, header.realizations)
}

fn begin<W: Write, H: Serialize>(mut writer: W, header: &H) -> Result<csv::Writer<W>> {
    writeln!(writer, "# {}", serde_json::to_string(header)?)?;
    Ok(csv::Writer::from_writer(writer))
}

fn load<R, H, T>(reader: R) -> Result<(H, Vec<T>)>
where
    R: io::Read,
    H: DeserializeOwned,
    T: DeserializeOwned,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let json = line
        .trim_end()
        .strip_prefix("# ")
        .ok_or_else(|| Error::MalformedRecord("missing `# ` header line".to_string()))?;
    let header = serde_json::from_str(json)?;

    let rows = csv::Reader::from_reader(reader)
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    Ok((header, rows))
}

fn checked_grid(grid: SamplingGrid) -> Result<SamplingGrid> {
    SamplingGrid::from_parts(grid.len(), grid.step_cm())
}

/// Rejects rows that do not sit on `grid`.
fn check_positions<I: ExactSizeIterator<Item = f64>>(grid: &SamplingGrid, positions: I) -> Result<()> {
    if positions.len() != grid.len() {
        return Err(Error::mismatch(
            Stage::Record,
            "row count",
            grid.len(),
            positions.len(),
        ));
    }
    let tolerance = 1e-9 * grid.step_cm();
    for (i, x) in positions.enumerate() {
        if (x - grid.position(i)).abs() > tolerance {
            return Err(Error::mismatch(Stage::Record, "row position", grid.position(i), x));
        }
    }
    Ok(())
}
