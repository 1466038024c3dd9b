pub mod graph;
pub mod profile;
pub mod usage;
pub mod user;
