pub mod cells;
pub mod consume;
pub mod progress;
pub mod request;
pub mod reset;
pub mod start;
