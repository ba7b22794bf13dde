// Data layer: CSV loading and the validated image/label types.

pub mod loader;
pub mod models;
