//! Column-oriented time tables shared by every pipeline stage.
//!
//! One generic [`TimeTable`] backs the three shapes a station's data goes
//! through: raw instrument rows keyed by UTC instants, hourly rows in the
//! station's time zone, and the naive-local fixed grid that is exported.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Raw readings at native instrument cadence, sorted by time on load.
pub type RawObservationTable = TimeTable<DateTime<Utc>>;

/// One row per hour, strictly increasing, in the station's time zone.
pub type HourlyTimeSeries = TimeTable<DateTime<Tz>>;

/// Hourly rows on the fixed trailing grid, time zone stripped.
pub type GapFilledSeries = TimeTable<NaiveDateTime>;

/// Suffix of the smoothed sibling column written for `smoothed` variables.
pub const ROLLING_SUFFIX: &str = "_rolling";

/// Name of the smoothed sibling column for `short_name`.
pub fn rolling_name(short_name: &str) -> String {
    format!("{short_name}{ROLLING_SUFFIX}")
}

/// A named column of optional readings. `None` is a missing value and is
/// never conflated with zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeTable<T> {
    index: Vec<T>,
    columns: Vec<Column>,
}

impl<T> TimeTable<T> {
    /// Empty table with the given column names, in order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index: Vec::new(),
            columns: names
                .into_iter()
                .map(|name| Column {
                    name: name.into(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    /// Table over `index` with no columns yet.
    pub fn with_index(index: Vec<T>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    /// Appends one row. `values` follows column order.
    pub fn push_row(&mut self, time: T, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.index.push(time);
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.values.push(value);
        }
    }

    /// Adds a column, replacing any existing column with the same name.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        let name = name.into();
        debug_assert_eq!(values.len(), self.index.len());
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    pub fn index(&self) -> &[T] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Vec<Option<f64>>> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .map(|c| &mut c.values)
    }

    /// Values of row `i` in column order.
    pub fn row(&self, i: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|c| c.values[i]).collect()
    }
}

impl<T: Ord> TimeTable<T> {
    /// Stable sort of all rows by timestamp.
    pub fn sort_by_time(&mut self) {
        if self.index.windows(2).all(|w| w[0] <= w[1]) {
            return;
        }
        let mut order: Vec<usize> = (0..self.index.len()).collect();
        order.sort_by(|&a, &b| self.index[a].cmp(&self.index[b]));

        let mut index: Vec<Option<T>> = self.index.drain(..).map(Some).collect();
        self.index = order.iter().filter_map(|&i| index[i].take()).collect();
        for column in &mut self.columns {
            column.values = order.iter().map(|&i| column.values[i]).collect();
        }
    }
}
