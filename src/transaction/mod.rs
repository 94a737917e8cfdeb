pub mod model;

pub use model::{Transaction, truncate_address};
