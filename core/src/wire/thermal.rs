use ndarray::Array2;
use serde::Deserialize;
use std::fmt;

use super::{resolve_timestamp, DecodeError};
use crate::math::stats::StatsHelper;

/// Temperature payload. 1D arrays are held as an `n x 1` grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalGrid {
    cells: Array2<f64>,
}

impl ThermalGrid {
    pub fn new(cells: Array2<f64>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &Array2<f64> {
        &self.cells
    }

    pub fn max_temperature(&self) -> f64 {
        StatsHelper::grid_max(&self.cells)
    }

    pub fn shape(&self) -> ShapeDescriptor {
        let (rows, cols) = self.cells.dim();
        ShapeDescriptor { rows, cols }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeDescriptor {
    pub rows: usize,
    pub cols: usize,
}

impl fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

#[derive(Debug, Clone)]
pub struct ThermalMessage {
    pub timestamp_ns: u64,
    pub grid: ThermalGrid,
    /// Shape reported by the sender, if any.
    pub reported_shape: Option<ShapeDescriptor>,
    pub distance_m: Option<f64>,
    pub drop_prob: Option<f64>,
}

impl ThermalMessage {
    /// Reported shape, falling back to the grid's own dimensions.
    pub fn shape(&self) -> ShapeDescriptor {
        self.reported_shape.unwrap_or_else(|| self.grid.shape())
    }

    pub fn max_temperature(&self) -> f64 {
        self.grid.max_temperature()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GridPayload {
    Matrix(Vec<Vec<f64>>),
    Array(Vec<f64>),
}

#[derive(Deserialize)]
struct RawThermal {
    #[serde(default, alias = "ts_ns", alias = "send_ts_ns")]
    timestamp_ns: Option<u64>,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    grid: Option<GridPayload>,
    #[serde(default)]
    shape: Option<Vec<usize>>,
    #[serde(default)]
    distance_m: Option<f64>,
    #[serde(default)]
    drop_prob: Option<f64>,
}

fn grid_from_payload(payload: GridPayload) -> Result<ThermalGrid, DecodeError> {
    let cells = match payload {
        GridPayload::Array(values) => {
            let len = values.len();
            Array2::from_shape_vec((len, 1), values)
        }
        GridPayload::Matrix(rows) => {
            let row_count = rows.len();
            let cols = rows.first().map(Vec::len).unwrap_or(0);
            if rows.iter().any(|row| row.len() != cols) {
                return Err(DecodeError::InvalidField {
                    field: "grid",
                    reason: "rows differ in length".into(),
                });
            }
            let flat: Vec<f64> = rows.into_iter().flatten().collect();
            Array2::from_shape_vec((row_count, cols), flat)
        }
    }
    .map_err(|err| DecodeError::InvalidField {
        field: "grid",
        reason: err.to_string(),
    })?;
    Ok(ThermalGrid::new(cells))
}

pub fn decode_thermal(line: &str) -> Result<ThermalMessage, DecodeError> {
    let raw: RawThermal = serde_json::from_str(line)?;
    let timestamp_ns = resolve_timestamp(raw.timestamp_ns, raw.timestamp)?;
    let grid = grid_from_payload(raw.grid.ok_or(DecodeError::MissingField("grid"))?)?;
    let reported_shape = raw.shape.and_then(|dims| match dims.as_slice() {
        [rows, cols, ..] => Some(ShapeDescriptor {
            rows: *rows,
            cols: *cols,
        }),
        _ => None,
    });

    Ok(ThermalMessage {
        timestamp_ns,
        grid,
        reported_shape,
        distance_m: raw.distance_m,
        drop_prob: raw.drop_prob,
    })
}
