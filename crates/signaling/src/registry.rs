//! Verbindungs-Registry – Wer ist in welchem Raum, wer schaut die Raumliste
//!
//! Die Registry ist der einzige Besitzer des ephemeren Verbindungs-Zustands:
//! Raum-Mitgliedschaften und Lobby-Mitgliedschaften. Kein anderer Teil des
//! Systems veraendert diese Maps direkt.
//!
//! ## Nebenlaeufigkeit
//! Jede Lese-Veraender-Schreib-Sequenz auf einem Raum laeuft unter dem
//! Entry-Lock der DashMap fuer genau diesen Raum. Damit ist die
//! Beitritts-Sequenz (Mitglieder-Schnappschuss, `new_peer`-Ankuendigung,
//! Einfuegen) gegen parallele Beitritte und Austritte desselben Raums
//! abgeschirmt. Alle Sendungen unter dem Lock sind nicht-blockierende
//! `try_send`-Aufrufe: ein langsamer Empfaenger haelt weder das Lock noch
//! andere Peers auf.
//!
//! ## Fehlerisolation beim Fan-out
//! Ein Empfaenger mit voller Queue verliert nur das aktuelle Frame.
//! Ein Empfaenger mit geschlossener Queue gilt als verwaist: er wird aus
//! der Mitgliedschaft entfernt und den verbleibenden Mitgliedern als
//! `peer_left` gemeldet – derselbe Abbau wie bei einer regulaeren Trennung.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use treffpunkt_core::{PeerId, RaumId};
use treffpunkt_protocol::signal::{PeerInfo, PeerRef, ServerFrame};

use crate::error::SignalingError;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Sende-Queue pro Verbindung
const SENDE_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// PeerHandle
// ---------------------------------------------------------------------------

/// Sende-Handle einer verbundenen Gegenstelle
#[derive(Debug, Clone)]
pub struct PeerHandle {
    pub peer_id: PeerId,
    pub name: String,
    tx: mpsc::Sender<ServerFrame>,
}

impl PeerHandle {
    /// Reiht ein Frame nicht-blockierend in die Sende-Queue ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, frame: ServerFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(peer_id = %self.peer_id, "Sende-Queue voll – Frame verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(peer_id = %self.peer_id, "Sende-Queue geschlossen (Verbindung getrennt)");
                false
            }
        }
    }

    /// Gibt true zurueck wenn die Gegenstelle ihre Queue nicht mehr liest
    pub fn ist_geschlossen(&self) -> bool {
        self.tx.is_closed()
    }

    fn info(&self) -> PeerInfo {
        PeerInfo {
            id: self.peer_id.clone(),
            name: self.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Zentrale Registry aller verbundenen Peers
///
/// Thread-safe via Arc + DashMap. Clone gibt eine Referenz auf denselben
/// inneren Zustand.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// raum_id -> Mitglieder (peer_id -> Handle)
    ///
    /// Ein Schluessel existiert nur solange mindestens ein Peer verbunden
    /// ist; der dauerhafte Raum-Datensatz lebt unabhaengig davon im
    /// Verzeichnis.
    raeume: DashMap<RaumId, HashMap<PeerId, PeerHandle>>,
    /// Peers in der Raumlisten-Ansicht (keinem Raum beigetreten)
    lobby: DashMap<PeerId, PeerHandle>,
}

impl ConnectionRegistry {
    /// Erstellt eine neue, leere Registry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                raeume: DashMap::new(),
                lobby: DashMap::new(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Raum-Mitgliedschaft
    // -----------------------------------------------------------------------

    /// Registriert einen Peer in einem Raum
    ///
    /// Gibt die VOR dem Beitritt vorhandenen Mitglieder sowie die
    /// Empfangs-Queue des neuen Peers zurueck. Bestehende Mitglieder
    /// erhalten ein `new_peer`-Frame; der Beitretende selbst nie.
    /// Eine im Raum bereits vergebene Peer-ID wird mit
    /// [`SignalingError::DoppelterPeer`] abgelehnt, nie ueberschrieben.
    pub fn beitreten(
        &self,
        raum_id: RaumId,
        peer_id: &PeerId,
        name: &str,
    ) -> Result<(Vec<PeerInfo>, mpsc::Receiver<ServerFrame>), SignalingError> {
        // Entry-Guard = exklusives Raum-Lock fuer die gesamte Sequenz
        let mut mitglieder = self.inner.raeume.entry(raum_id).or_default();

        if mitglieder.contains_key(peer_id) {
            return Err(SignalingError::DoppelterPeer(peer_id.clone()));
        }

        let bestehende: Vec<PeerInfo> = mitglieder.values().map(PeerHandle::info).collect();

        let ankuendigung = ServerFrame::NewPeer {
            payload: PeerInfo {
                id: peer_id.clone(),
                name: name.to_string(),
            },
        };
        Self::fanout(&mut mitglieder, ankuendigung, None);

        let (tx, rx) = mpsc::channel(SENDE_QUEUE_GROESSE);
        mitglieder.insert(
            peer_id.clone(),
            PeerHandle {
                peer_id: peer_id.clone(),
                name: name.to_string(),
                tx,
            },
        );

        tracing::info!(
            raum_id = %raum_id,
            peer_id = %peer_id,
            mitglieder = mitglieder.len(),
            "Peer beigetreten"
        );

        Ok((bestehende, rx))
    }

    /// Entfernt einen Peer aus einem Raum
    ///
    /// Der Raum-Schluessel faellt weg sobald das letzte Mitglied geht; der
    /// dauerhafte Raum-Datensatz bleibt unberuehrt. Verbleibende
    /// Mitglieder erhalten ein `peer_left`-Frame.
    pub fn verlassen(&self, raum_id: RaumId, peer_id: &PeerId) {
        let raum_leer = {
            let mut mitglieder = match self.inner.raeume.get_mut(&raum_id) {
                Some(m) => m,
                None => return,
            };

            if mitglieder.remove(peer_id).is_none() {
                return;
            }

            if !mitglieder.is_empty() {
                let abmeldung = ServerFrame::PeerLeft {
                    payload: PeerRef {
                        id: peer_id.clone(),
                    },
                };
                Self::fanout(&mut mitglieder, abmeldung, None);
            }
            mitglieder.is_empty()
        };

        if raum_leer {
            self.inner.raeume.remove_if(&raum_id, |_, m| m.is_empty());
            tracing::debug!(raum_id = %raum_id, "Letzter Peer gegangen – Raum aus der Registry entfernt");
        }

        tracing::info!(raum_id = %raum_id, peer_id = %peer_id, "Peer hat den Raum verlassen");
    }

    /// Stellt ein Frame genau einem Peer zu
    ///
    /// Gibt `false` zurueck wenn Raum oder Peer nicht (mehr) registriert
    /// sind – eine Trennung die sich mit einem Relay ueberschneidet ist
    /// erwartet, kein Fehler.
    pub fn an_peer_senden(&self, raum_id: RaumId, peer_id: &PeerId, frame: ServerFrame) -> bool {
        match self.inner.raeume.get(&raum_id) {
            Some(mitglieder) => match mitglieder.get(peer_id) {
                Some(handle) => handle.senden(frame),
                None => false,
            },
            None => false,
        }
    }

    /// Stellt ein Frame allen Mitgliedern eines Raums zu
    ///
    /// `ausser` wird uebersprungen. Gibt die Anzahl erfolgreicher
    /// Zustellungen zurueck; verwaiste Empfaenger werden dabei entfernt.
    pub fn raum_broadcast(
        &self,
        raum_id: RaumId,
        frame: ServerFrame,
        ausser: Option<&PeerId>,
    ) -> usize {
        let (gesendet, raum_leer) = match self.inner.raeume.get_mut(&raum_id) {
            Some(mut mitglieder) => {
                let n = Self::fanout(&mut mitglieder, frame, ausser);
                (n, mitglieder.is_empty())
            }
            None => return 0,
        };

        if raum_leer {
            self.inner.raeume.remove_if(&raum_id, |_, m| m.is_empty());
        }
        gesendet
    }

    /// Gibt die Anzahl der aktuell verbundenen Peers eines Raums zurueck
    pub fn mitglieder_anzahl(&self, raum_id: RaumId) -> usize {
        self.inner
            .raeume
            .get(&raum_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Prueft ob ein Raum mindestens einen verbundenen Peer hat
    pub fn ist_raum_registriert(&self, raum_id: RaumId) -> bool {
        self.inner.raeume.contains_key(&raum_id)
    }

    /// Gibt die aktuelle Mitgliederliste eines Raums zurueck
    pub fn mitglieder(&self, raum_id: RaumId) -> Vec<PeerInfo> {
        self.inner
            .raeume
            .get(&raum_id)
            .map(|m| m.values().map(PeerHandle::info).collect())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Lobby-Mitgliedschaft
    // -----------------------------------------------------------------------

    /// Registriert einen Peer in der Lobby (Raumlisten-Ansicht)
    pub fn lobby_beitreten(
        &self,
        peer_id: &PeerId,
        name: &str,
    ) -> Result<mpsc::Receiver<ServerFrame>, SignalingError> {
        use dashmap::mapref::entry::Entry;

        match self.inner.lobby.entry(peer_id.clone()) {
            Entry::Occupied(_) => Err(SignalingError::DoppelterPeer(peer_id.clone())),
            Entry::Vacant(platz) => {
                let (tx, rx) = mpsc::channel(SENDE_QUEUE_GROESSE);
                platz.insert(PeerHandle {
                    peer_id: peer_id.clone(),
                    name: name.to_string(),
                    tx,
                });
                tracing::debug!(peer_id = %peer_id, "Peer in der Lobby registriert");
                Ok(rx)
            }
        }
    }

    /// Entfernt einen Peer aus der Lobby
    pub fn lobby_verlassen(&self, peer_id: &PeerId) {
        if self.inner.lobby.remove(peer_id).is_some() {
            tracing::debug!(peer_id = %peer_id, "Peer aus der Lobby entfernt");
        }
    }

    /// Gibt die Anzahl der Lobby-Peers zurueck
    pub fn lobby_anzahl(&self) -> usize {
        self.inner.lobby.len()
    }

    /// Stellt ein Frame allen Lobby-Peers zu
    ///
    /// Verwaiste Empfaenger werden aus der Lobby entfernt. Gibt die Anzahl
    /// erfolgreicher Zustellungen zurueck.
    pub fn lobby_broadcast(&self, frame: ServerFrame) -> usize {
        let mut gesendet = 0;
        let mut verwaiste: Vec<PeerId> = Vec::new();

        for eintrag in self.inner.lobby.iter() {
            if eintrag.value().senden(frame.clone()) {
                gesendet += 1;
            } else if eintrag.value().ist_geschlossen() {
                verwaiste.push(eintrag.key().clone());
            }
        }

        for peer_id in verwaiste {
            self.inner.lobby.remove(&peer_id);
            tracing::debug!(peer_id = %peer_id, "Verwaisten Lobby-Peer entfernt");
        }
        gesendet
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    /// Fan-out an alle Mitglieder einer Map, mit isolierter Fehlerbehandlung
    ///
    /// Geschlossene Empfaenger werden entfernt und den verbleibenden als
    /// `peer_left` gemeldet. Fehlgeschlagene Zustellungen der Abmeldungen
    /// selbst werden nur geloggt; solche Empfaenger faengt der naechste
    /// Fan-out.
    fn fanout(
        mitglieder: &mut HashMap<PeerId, PeerHandle>,
        frame: ServerFrame,
        ausser: Option<&PeerId>,
    ) -> usize {
        let mut gesendet = 0;
        let mut verwaiste: Vec<PeerId> = Vec::new();

        for (peer_id, handle) in mitglieder.iter() {
            if Some(peer_id) == ausser {
                continue;
            }
            if handle.senden(frame.clone()) {
                gesendet += 1;
            } else if handle.ist_geschlossen() {
                verwaiste.push(peer_id.clone());
            }
        }

        for peer_id in verwaiste {
            mitglieder.remove(&peer_id);
            tracing::debug!(peer_id = %peer_id, "Verwaisten Empfaenger aus dem Raum entfernt");

            let abmeldung = ServerFrame::PeerLeft {
                payload: PeerRef { id: peer_id },
            };
            for handle in mitglieder.values() {
                let _ = handle.senden(abmeldung.clone());
            }
        }
        gesendet
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
