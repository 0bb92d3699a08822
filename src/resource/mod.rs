pub mod controller;
pub mod driver;
