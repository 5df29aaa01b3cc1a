//! treffpunkt-core – Gemeinsame Typen fuer alle Treffpunkt-Crates
//!
//! Enthaelt die ID-Newtypes, den zentralen Fehler-Enum und den
//! Passwort-Digest der sowohl beim Anlegen eines Raums als auch bei der
//! Authentifizierung einer Verbindung verwendet wird.

pub mod error;
pub mod passwort;
pub mod types;

// Bequeme Re-Exporte
pub use error::{Result, TreffpunktError};
pub use types::{PeerId, RaumId};
