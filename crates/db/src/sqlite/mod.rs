//! SQLite-Implementierung des Raum-Verzeichnisses

pub mod pool;
pub mod raeume;

pub use pool::SqliteDb;
