pub mod assistant;
pub mod coach;
pub mod db;
pub mod local_cache;
pub mod models;
pub mod mutation;
pub mod remote;
pub mod reports;
pub mod session;
pub mod sync;
pub mod workout;
