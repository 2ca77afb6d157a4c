#![forbid(unsafe_code)]

pub mod activity;
pub mod model;
pub mod navigation;
pub mod progress;
pub mod streak;
pub mod time;

pub use time::Clock;
