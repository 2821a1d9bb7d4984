pub mod bar;
pub mod indicators;
pub mod loader;

pub use bar::{Bar, BarError};
pub use loader::{group_by_symbol, load_csv};
