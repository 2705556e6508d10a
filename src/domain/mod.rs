pub mod bank;
pub mod selectors;
pub mod staging_row;
pub mod unit;
