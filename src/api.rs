pub mod forecast_provider;
pub mod history_provider;
pub mod home_assistant;
pub mod inverter;
pub mod solcast;
pub mod state_of_charge;
