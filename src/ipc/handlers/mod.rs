pub mod activities;
pub mod backup;
pub mod calendar;
pub mod core;
pub mod goals;
pub mod maintenance;
pub mod settings;
pub mod staff;
pub mod students;
