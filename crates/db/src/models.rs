//! Datenbankmodelle fuer das Raum-Verzeichnis
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind reine Datenuebertragungsobjekte ohne Geschaeftslogik.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use treffpunkt_core::RaumId;

/// Raum-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaumRecord {
    pub id: RaumId,
    /// Raumname, eindeutig im gesamten Verzeichnis
    pub name: String,
    /// SHA-256-Digest des Raum-Passworts (hex), None = kein Passwort
    pub password_hash: Option<String>,
    /// Zeitpunkt des letzten erfolgreichen Beitritts
    pub last_activity: DateTime<Utc>,
}

impl RaumRecord {
    /// Gibt true zurueck wenn der Raum passwortgeschuetzt ist
    pub fn hat_passwort(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Daten zum Anlegen eines neuen Raums
#[derive(Debug, Clone)]
pub struct NeuerRaum<'a> {
    pub name: &'a str,
    /// Bereits gehashtes Passwort; None = offener Raum
    pub password_hash: Option<&'a str>,
}

/// Oeffentliche Raum-Zusammenfassung fuer Listen-Antworten
///
/// Der Passwort-Digest verlaesst den Server nie; nach aussen sichtbar ist
/// nur ob ein Passwort gesetzt ist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaumUebersicht {
    pub id: RaumId,
    pub name: String,
    pub has_password: bool,
}

impl From<&RaumRecord> for RaumUebersicht {
    fn from(record: &RaumRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            has_password: record.hat_passwort(),
        }
    }
}
