pub mod battery;
pub mod forecast;
pub mod interval;
pub mod load;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod schedule;
pub mod series;
pub mod window;
