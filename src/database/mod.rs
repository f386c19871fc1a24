pub mod connection;
pub mod giving_repository;

pub use giving_repository::{GivingRepository, PgGivingRepository};
