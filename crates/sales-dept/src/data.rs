//! Append-only per-day observation columns.

use std::collections::BTreeMap;
use thiserror::Error;

/// Misuse of a [`DataStorage`].
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    /// Days must be recorded in increasing order.
    #[error("day {day} recorded at or before last observed day {last}")]
    OutOfOrder {
        /// Day being recorded.
        day: u32,
        /// Last day already on record.
        last: u32,
    },
}

/// What a sales department records every day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SalesDataType {
    /// Most recent realized sale price.
    LastClosingPrice,
    /// Mean price of today's sales.
    AverageClosingPrice,
    /// Units sold today.
    Outflow,
    /// Units tasked for sale today.
    Inflow,
    /// Units waiting to be sold at the end of the day.
    GoodsToSell,
    /// Inventory over net outflow.
    DaysOfInventory,
    /// Pricing strategy's equilibrium gap.
    SupplyGap,
    /// Firm workers producing this good.
    WorkersProducing,
    /// Ask the pricing strategy would set at the last known cost.
    HypotheticalAsk,
}

impl SalesDataType {
    /// Every column, in recording order.
    pub const ALL: [SalesDataType; 9] = [
        SalesDataType::LastClosingPrice,
        SalesDataType::AverageClosingPrice,
        SalesDataType::Outflow,
        SalesDataType::Inflow,
        SalesDataType::GoodsToSell,
        SalesDataType::DaysOfInventory,
        SalesDataType::SupplyGap,
        SalesDataType::WorkersProducing,
        SalesDataType::HypotheticalAsk,
    ];
}

/// Per-day columns of observations keyed by `K`.
///
/// The first recorded day becomes the starting day. Skipped days are padded
/// with NaN so every column stays aligned with the calendar.
#[derive(Clone, Debug)]
pub struct DataStorage<K> {
    columns: BTreeMap<K, Vec<f64>>,
    starting_day: Option<u32>,
    len: usize,
}

impl<K: Ord + Copy> DataStorage<K> {
    /// Empty storage with one column per key.
    pub fn new(keys: &[K]) -> Self {
        Self {
            columns: keys.iter().map(|k| (*k, Vec::new())).collect(),
            starting_day: None,
            len: 0,
        }
    }

    /// Record the observations of `day`. Keys missing from `row` get NaN,
    /// unknown keys are ignored.
    pub fn record_day<I>(&mut self, day: u32, row: I) -> Result<(), DataError>
    where
        I: IntoIterator<Item = (K, f64)>,
    {
        if let Some(last) = self.last_observed_day() {
            if day <= last {
                return Err(DataError::OutOfOrder { day, last });
            }
        }
        let start = *self.starting_day.get_or_insert(day);
        let index = (day - start) as usize;
        for column in self.columns.values_mut() {
            column.resize(index + 1, f64::NAN);
        }
        for (key, value) in row {
            if let Some(column) = self.columns.get_mut(&key) {
                column[index] = value;
            }
        }
        self.len = index + 1;
        Ok(())
    }

    /// Number of recorded days, padding included.
    pub fn number_of_observations(&self) -> usize {
        self.len
    }

    /// First recorded day.
    pub fn starting_day(&self) -> Option<u32> {
        self.starting_day
    }

    /// Last recorded day.
    pub fn last_observed_day(&self) -> Option<u32> {
        match self.starting_day {
            Some(start) if self.len > 0 => Some(start + self.len as u32 - 1),
            _ => None,
        }
    }

    /// Most recent value of `key`.
    pub fn latest(&self, key: K) -> Option<f64> {
        self.columns.get(&key)?.last().copied()
    }

    /// Value of `key` recorded on `day`.
    pub fn on_day(&self, key: K, day: u32) -> Option<f64> {
        let offset = day.checked_sub(self.starting_day?)? as usize;
        self.columns.get(&key)?.get(offset).copied()
    }

    /// Values of `key` from `first` to `last`, both inclusive. Empty when
    /// `first > last`; `None` when the range leaves the recorded days.
    pub fn between(&self, key: K, first: i64, last: i64) -> Option<&[f64]> {
        let column = self.columns.get(&key)?;
        if first > last {
            return Some(&[]);
        }
        let start = i64::from(self.starting_day?);
        let end = i64::from(self.last_observed_day()?);
        if first < start || last > end {
            return None;
        }
        column.get((first - start) as usize..=(last - start) as usize)
    }

    /// Every recorded value of `key`.
    pub fn column(&self, key: K) -> &[f64] {
        self.columns.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }
}
