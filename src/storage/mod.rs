pub mod sqlite;

pub use sqlite::StateStore;
