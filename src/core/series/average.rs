use std::{
    collections::HashMap,
    ops::{Add, Div},
};

use chrono::{DateTime, Local, NaiveTime};

impl<T> AverageByTimeOfDay for T where T: ?Sized {}

pub trait AverageByTimeOfDay {
    /// Group the points by local time of day and average the values across days.
    fn average_by_time_of_day<V>(self) -> HashMap<NaiveTime, V>
    where
        Self: Sized + Iterator<Item = (DateTime<Local>, V)>,
        V: Copy + Add<V, Output = V> + Div<f64, Output = V>,
    {
        let mut sums: HashMap<NaiveTime, (V, u32)> = HashMap::new();
        for (timestamp, value) in self {
            sums.entry(timestamp.time())
                .and_modify(|(sum, weight)| {
                    *sum = *sum + value;
                    *weight += 1;
                })
                .or_insert((value, 1));
        }
        sums.into_iter().map(|(time, (sum, weight))| (time, sum / f64::from(weight))).collect()
    }
}
