mod average;
mod resample;

use chrono::{DateTime, Local};

pub use self::{average::AverageByTimeOfDay, resample::Resample};

pub type Point<V> = (DateTime<Local>, V);
pub type Series<V> = Vec<Point<V>>;
