pub mod color;
pub mod controller;
pub mod palette;
