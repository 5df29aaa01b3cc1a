//! Gemeinsame Identifikationstypen fuer Treffpunkt
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};

/// Eindeutige Raum-ID
///
/// Stabile Ganzzahl die vom Raum-Verzeichnis beim Anlegen vergeben wird
/// (SQLite AUTOINCREMENT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaumId(pub i64);

impl RaumId {
    /// Gibt die innere Ganzzahl zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RaumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "raum:{}", self.0)
    }
}

/// Peer-ID innerhalb eines Raums
///
/// Wird vom Client selbst vergeben und muss nur innerhalb seines Raums
/// eindeutig sein. Kollisionen lehnt die Registry beim Beitritt ab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Erstellt eine PeerId aus einem beliebigen String
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die ID als &str zurueck
    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raum_id_anzeige() {
        let id = RaumId(7);
        assert_eq!(id.to_string(), "raum:7");
        assert_eq!(id.inner(), 7);
    }

    #[test]
    fn raum_id_serde_transparent() {
        let id = RaumId(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let zurueck: RaumId = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, id);
    }

    #[test]
    fn peer_id_serde_transparent() {
        let id = PeerId::neu("peer-abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"peer-abc\"");
        let zurueck: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, id);
    }

    #[test]
    fn peer_id_aus_str() {
        let id: PeerId = "p1".into();
        assert_eq!(id.als_str(), "p1");
    }
}
