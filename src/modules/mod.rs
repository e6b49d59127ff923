pub mod marketplace;
pub mod persistence;
pub mod system;
