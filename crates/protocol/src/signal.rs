//! Signaling-Protokoll (TCP)
//!
//! Definiert alle Nachrichten die ueber die TCP-Verbindung zwischen
//! Client und Server ausgetauscht werden.
//!
//! ## Design
//! - JSON-Serialisierung via serde (Signaling ist nicht zeitkritisch)
//! - Tagged Enums fuer typsichere Nachrichtentypen
//! - SDP/ICE-Payloads bleiben opake JSON-Werte: der Server reicht sie
//!   nur durch, er interpretiert sie nie
//! - Das erste Frame einer Verbindung adressiert die Sitzung (`join`
//!   oder `lobby`); danach folgt bei Raum-Sitzungen genau ein
//!   Credential-Frame

use serde::{Deserialize, Serialize};
use serde_json::Value;
use treffpunkt_core::{PeerId, RaumId};

// ---------------------------------------------------------------------------
// Schliess-Codes
// ---------------------------------------------------------------------------

/// Numerische Schliess-Codes beim Verbindungsabbau
///
/// Jeder Code traegt zusaetzlich einen menschenlesbaren Grund. Die Werte
/// 4000/4001/4004 entsprechen den etablierten Codes der Signaling-Clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Raum hat ein Passwort und der Digest stimmt nicht ueberein
    FalschesPasswort,
    /// Credential-Frame unlesbar oder Authentifizierung nicht moeglich
    AuthFehlgeschlagen,
    /// Kein Raum mit dieser ID im Verzeichnis
    RaumNichtGefunden,
    /// Peer-ID ist im Zielraum bereits vergeben
    DoppelterPeer,
}

impl CloseCode {
    /// Gibt den numerischen Code zurueck
    pub fn code(&self) -> u16 {
        match self {
            Self::FalschesPasswort => 4000,
            Self::AuthFehlgeschlagen => 4001,
            Self::RaumNichtGefunden => 4004,
            Self::DoppelterPeer => 4009,
        }
    }

    /// Gibt den menschenlesbaren Grund zurueck
    pub fn grund(&self) -> &'static str {
        match self {
            Self::FalschesPasswort => "Falsches Passwort",
            Self::AuthFehlgeschlagen => "Authentifizierung fehlgeschlagen",
            Self::RaumNichtGefunden => "Raum nicht gefunden",
            Self::DoppelterPeer => "Peer-ID bereits vergeben",
        }
    }
}

// ---------------------------------------------------------------------------
// Credential-Frame
// ---------------------------------------------------------------------------

/// Credential-Frame einer Raum-Sitzung (ohne type-Tag)
///
/// Wird nach der Adressierung genau einmal erwartet, bevor irgendein
/// anderer Verkehr verarbeitet wird. Ein fehlendes `password`-Feld zaehlt
/// als leeres Passwort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialFrame {
    #[serde(default)]
    pub password: String,
}

// ---------------------------------------------------------------------------
// Mitglieds-Infos
// ---------------------------------------------------------------------------

/// Mitglieds-Info fuer `room_state` und `new_peer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub name: String,
}

/// Reiner ID-Verweis fuer `peer_left`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRef {
    pub id: PeerId,
}

/// Ereignis-Art fuer `rooms_updated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaumEvent {
    RoomCreated,
    RoomDeleted,
    RoomUpdated,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Alle Frames die ein Client senden kann (typsicher via Tagged Enum)
///
/// Unbekannte oder falsch getaggte Frames schlagen bei der
/// Deserialisierung fehl und werden vom Server verworfen, nicht mit einem
/// Verbindungsabbau quittiert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Adressiert eine Raum-Sitzung (erstes Frame der Verbindung)
    Join {
        room_id: RaumId,
        peer_id: PeerId,
        display_name: String,
    },
    /// Adressiert eine Lobby-Sitzung (erstes Frame der Verbindung)
    Lobby {
        peer_id: PeerId,
        display_name: String,
    },
    /// SDP-Offer/Answer an genau einen Peer im selben Raum
    Sdp { to_id: PeerId, payload: Value },
    /// ICE-Kandidat an genau einen Peer im selben Raum
    Ice { to_id: PeerId, payload: Value },
    /// Fordert die aktuelle Mitgliederliste erneut an (wird nicht relayt)
    RefreshUsers,
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Alle Frames die der Server senden kann
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Aktuelle Mitgliederliste (ohne den Empfaenger selbst)
    RoomState { payload: Vec<PeerInfo> },
    /// Ein neuer Peer ist dem Raum beigetreten
    NewPeer { payload: PeerInfo },
    /// Ein Peer hat den Raum verlassen
    PeerLeft { payload: PeerRef },
    /// Weitergereichtes SDP, gestempelt mit dem tatsaechlichen Absender
    Sdp { from_id: PeerId, payload: Value },
    /// Weitergereichter ICE-Kandidat, gestempelt mit dem Absender
    Ice { from_id: PeerId, payload: Value },
    /// Die Raumliste hat sich geaendert (nur an Lobby-Verbindungen)
    RoomsUpdated { event: RaumEvent },
    /// Abschieds-Frame mit Schliess-Code und Grund, danach TCP-Abbau
    Close { code: u16, reason: String },
}

impl ServerFrame {
    /// Erstellt das Abschieds-Frame zu einem Schliess-Code
    pub fn schliessen(code: CloseCode) -> Self {
        Self::Close {
            code: code.code(),
            reason: code.grund().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
