pub mod cache;
pub mod generation;
pub mod job;
pub mod timestamp;
