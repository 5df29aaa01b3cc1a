//! Fehlertypen fuer den Signaling-Service

use thiserror::Error;
use treffpunkt_core::{PeerId, RaumId};

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Kein Raum mit dieser ID im Verzeichnis
    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(RaumId),

    /// Peer-ID ist im Zielraum oder in der Lobby bereits vergeben
    #[error("Peer-ID bereits vergeben: {0}")]
    DoppelterPeer(PeerId),

    /// Credential-Frame unlesbar oder Passwort falsch
    #[error("Authentifizierung fehlgeschlagen")]
    AuthFehlgeschlagen,

    /// Fehler aus dem Raum-Verzeichnis
    #[error("Datenbankfehler: {0}")]
    Datenbank(#[from] treffpunkt_db::DbError),

    /// Ungueltige Konfiguration (z.B. Bereinigungs-Intervall 0)
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
