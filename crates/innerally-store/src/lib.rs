pub mod checkins;
pub mod database;
pub mod error;
pub mod healing;
pub mod journal;
pub mod profile;
pub mod row_helpers;
pub mod schema;
pub mod trends;

pub use database::Database;
pub use error::StoreError;
