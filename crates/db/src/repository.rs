//! Repository-Trait fuer das Raum-Verzeichnis
//!
//! Der Signaling-Kern und die REST-Schnittstelle greifen ausschliesslich
//! ueber diesen Trait auf das Verzeichnis zu. Die Datenbank garantiert
//! Atomizitaet fuer jede einzelne Operation (Anlegen-wenn-frei nach Name,
//! Zeitstempel-Update, Loeschen nach ID).

use chrono::{DateTime, Utc};
use treffpunkt_core::RaumId;

use crate::error::DbError;
use crate::models::{NeuerRaum, RaumRecord};

/// Result-Alias fuer Datenbank-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://treffpunkt.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://treffpunkt.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Repository fuer Raum-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait RaumRepository: Send + Sync {
    /// Legt einen neuen Raum an
    ///
    /// Raumnamen sind eindeutig; ein vergebener Name schlaegt mit
    /// [`DbError::Eindeutigkeit`] fehl.
    async fn erstellen(&self, daten: NeuerRaum<'_>) -> DbResult<RaumRecord>;

    /// Laedt einen Raum anhand seiner ID
    async fn laden(&self, id: RaumId) -> DbResult<Option<RaumRecord>>;

    /// Laedt alle Raeume
    async fn alle(&self) -> DbResult<Vec<RaumRecord>>;

    /// Setzt den Zeitpunkt der letzten Aktivitaet eines Raums
    async fn aktivitaet_aktualisieren(
        &self,
        id: RaumId,
        zeitpunkt: DateTime<Utc>,
    ) -> DbResult<()>;

    /// Loescht einen Raum; gibt true zurueck wenn ein Datensatz entfernt wurde
    async fn loeschen(&self, id: RaumId) -> DbResult<bool>;
}
