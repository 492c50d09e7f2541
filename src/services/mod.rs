pub mod auth;
pub mod cache;
pub mod clock;
pub mod generative;
pub mod jobs;
