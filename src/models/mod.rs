pub mod apps;
pub mod hosts;
pub mod records;
pub mod views;
