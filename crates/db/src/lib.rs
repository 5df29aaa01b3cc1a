//! treffpunkt-db – Raum-Verzeichnis
//!
//! Dauerhafter Speicher fuer Raum-Datensaetze (Name, optionaler
//! Passwort-Digest, letzte Aktivitaet). Das Repository-Pattern entkoppelt
//! die Aufrufer von der konkreten SQLite-Implementierung; der
//! Signaling-Kern konsumiert ausschliesslich den [`RaumRepository`]-Trait.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

// Bequeme Re-Exporte
pub use error::DbError;
pub use models::{NeuerRaum, RaumRecord, RaumUebersicht};
pub use repository::{DatabaseConfig, DbResult, RaumRepository};
pub use sqlite::SqliteDb;
