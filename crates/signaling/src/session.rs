//! Signaling-Sitzung – Zustandsmaschine einer einzelnen Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `SignalingSession` in einem eigenen
//! tokio-Task.
//!
//! ## State Machine
//! ```text
//! Verbindet -> Authentifizierung -> Beigetreten
//!     |               |                 |
//!     +---------------+--> Getrennt <---+
//! ```
//!
//! `Authentifizierung` gilt bei Raeumen ohne Passwort als sofort
//! bestanden; das Credential-Frame wird trotzdem konsumiert damit die
//! Rahmung fuer beide Raumarten identisch bleibt.
//!
//! Eine Lobby-Sitzung ueberspringt beide Zwischenzustaende: sie
//! registriert sich nur fuer Raumlisten-Benachrichtigungen und verwirft
//! saemtlichen eingehenden Verkehr (Keep-Alive).

use bytes::BytesMut;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;
use treffpunkt_core::{passwort::passwort_pruefen, PeerId, RaumId};
use treffpunkt_db::RaumRepository;
use treffpunkt_protocol::{
    signal::{ClientFrame, CloseCode, CredentialFrame, ServerFrame},
    wire::FrameCodec,
};

use crate::server_state::SignalingState;

// ---------------------------------------------------------------------------
// Sitzungszustand
// ---------------------------------------------------------------------------

/// Zustand einer Signaling-Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitzungsZustand {
    /// Verbunden, Adressierung noch nicht eingetroffen
    Verbindet,
    /// Raum nachgeschlagen, Credential-Frame ausstehend
    Authentifizierung,
    /// Im Raum registriert, Relay-Betrieb
    Beigetreten,
    /// Verbindung wird abgebaut
    Getrennt,
}

// ---------------------------------------------------------------------------
// SignalingSession
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne Signaling-Verbindung
///
/// Liest rohe Frames via `FrameCodec`, interpretiert sie je nach
/// Sitzungszustand und reicht SDP/ICE-Frames ueber die Registry weiter.
pub struct SignalingSession<R>
where
    R: RaumRepository + 'static,
{
    state: Arc<SignalingState<R>>,
    peer_addr: SocketAddr,
}

impl<R> SignalingSession<R>
where
    R: RaumRepository + 'static,
{
    /// Erstellt eine neue SignalingSession
    pub fn neu(state: Arc<SignalingState<R>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verarbeitungsschleife der Verbindung
    ///
    /// Das erste Frame adressiert die Sitzung: `join` fuer eine
    /// Raum-Sitzung, `lobby` fuer die Raumlisten-Ansicht. Alles andere
    /// beendet die Verbindung mit einem Abschieds-Frame.
    pub async fn verarbeiten(self, stream: TcpStream, shutdown_rx: watch::Receiver<bool>) {
        let mut framed = Framed::new(stream, FrameCodec::new());

        let erstes = match framed.next().await {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                tracing::warn!(peer = %self.peer_addr, fehler = %e, "Frame-Lesefehler vor der Adressierung");
                return;
            }
            None => {
                tracing::debug!(peer = %self.peer_addr, "Verbindung ohne Adressierung getrennt");
                return;
            }
        };

        match serde_json::from_slice::<ClientFrame>(&erstes) {
            Ok(ClientFrame::Join {
                room_id,
                peer_id,
                display_name,
            }) => {
                self.raum_sitzung(&mut framed, room_id, peer_id, display_name, shutdown_rx)
                    .await;
            }
            Ok(ClientFrame::Lobby {
                peer_id,
                display_name,
            }) => {
                self.lobby_sitzung(&mut framed, peer_id, display_name, shutdown_rx)
                    .await;
            }
            Ok(_) | Err(_) => {
                tracing::warn!(peer = %self.peer_addr, "Erstes Frame ist keine gueltige Adressierung");
                verabschieden(&mut framed, CloseCode::AuthFehlgeschlagen).await;
            }
        }
    }

    /// Raum-Sitzung: Authentifizierung, Beitritt, Relay-Betrieb
    async fn raum_sitzung(
        &self,
        framed: &mut Framed<TcpStream, FrameCodec>,
        raum_id: RaumId,
        peer_id: PeerId,
        anzeige_name: String,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut zustand = SitzungsZustand::Verbindet;
        tracing::debug!(
            peer = %self.peer_addr,
            raum_id = %raum_id,
            peer_id = %peer_id,
            zustand = ?zustand,
            "Raum-Sitzung beginnt"
        );

        // Verbindet -> Authentifizierung: Raum nachschlagen
        let raum = match self.state.verzeichnis.laden(raum_id).await {
            Ok(Some(raum)) => raum,
            Ok(None) => {
                tracing::info!(raum_id = %raum_id, "Beitritt zu unbekanntem Raum abgelehnt");
                verabschieden(framed, CloseCode::RaumNichtGefunden).await;
                return;
            }
            Err(e) => {
                tracing::error!(raum_id = %raum_id, fehler = %e, "Raum-Verzeichnis nicht lesbar");
                verabschieden(framed, CloseCode::AuthFehlgeschlagen).await;
                return;
            }
        };
        zustand = SitzungsZustand::Authentifizierung;
        tracing::debug!(peer_id = %peer_id, zustand = ?zustand, "Warte auf Credential-Frame");

        // Genau ein Credential-Frame, vor jedem anderen Verkehr
        let credential = match framed.next().await {
            Some(Ok(bytes)) => bytes,
            _ => {
                tracing::debug!(peer_id = %peer_id, "Getrennt waehrend der Authentifizierung");
                return;
            }
        };

        if let Some(erwartet) = raum.password_hash.as_deref() {
            let geliefert = match serde_json::from_slice::<CredentialFrame>(&credential) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::info!(raum_id = %raum_id, fehler = %e, "Unlesbares Credential-Frame");
                    verabschieden(framed, CloseCode::AuthFehlgeschlagen).await;
                    return;
                }
            };
            if !passwort_pruefen(&geliefert.password, erwartet) {
                tracing::info!(raum_id = %raum_id, peer_id = %peer_id, "Falsches Raum-Passwort");
                verabschieden(framed, CloseCode::FalschesPasswort).await;
                return;
            }
        }
        // Raeume ohne Passwort: Frame nur konsumiert, Inhalt ignoriert

        // Authentifizierung -> Beigetreten: in der Registry anmelden
        let (bestehende, mut empfang) =
            match self
                .state
                .registry
                .beitreten(raum_id, &peer_id, &anzeige_name)
            {
                Ok(ergebnis) => ergebnis,
                Err(e) => {
                    tracing::info!(raum_id = %raum_id, peer_id = %peer_id, fehler = %e, "Beitritt abgelehnt");
                    verabschieden(framed, CloseCode::DoppelterPeer).await;
                    return;
                }
            };
        zustand = SitzungsZustand::Beigetreten;
        tracing::info!(
            raum_id = %raum_id,
            peer_id = %peer_id,
            zustand = ?zustand,
            "Peer authentifiziert und beigetreten"
        );

        // Dem neuen Peer mitteilen wer schon da ist
        if framed
            .send(ServerFrame::RoomState {
                payload: bestehende,
            })
            .await
            .is_err()
        {
            self.state.registry.verlassen(raum_id, &peer_id);
            return;
        }

        if let Err(e) = self
            .state
            .verzeichnis
            .aktivitaet_aktualisieren(raum_id, Utc::now())
            .await
        {
            tracing::warn!(raum_id = %raum_id, fehler = %e, "Raum-Aktivitaet nicht aktualisierbar");
        }

        // Relay-Schleife
        loop {
            tokio::select! {
                frame = framed.next() => match frame {
                    Some(Ok(bytes)) => {
                        if self.relay_frame(framed, raum_id, &peer_id, &bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(peer_id = %peer_id, fehler = %e, "Frame-Lesefehler");
                        break;
                    }
                    None => {
                        tracing::debug!(peer_id = %peer_id, "Verbindung vom Client getrennt");
                        break;
                    }
                },

                // Ausgehende Frames aus der Registry (Relay, Ankuendigungen)
                ausgehend = empfang.recv() => match ausgehend {
                    Some(frame) => {
                        if framed.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!(peer_id = %peer_id, "Shutdown-Signal – Sitzung wird beendet");
                        break;
                    }
                }
            }
        }

        zustand = SitzungsZustand::Getrennt;
        tracing::info!(
            raum_id = %raum_id,
            peer_id = %peer_id,
            zustand = ?zustand,
            "Raum-Sitzung beendet"
        );
        self.state.registry.verlassen(raum_id, &peer_id);
    }

    /// Verarbeitet ein Frame im Zustand `Beigetreten`
    ///
    /// Unbekannte oder unlesbare Frames werden verworfen; die Sitzung
    /// bleibt bestehen. Ein Fehler bedeutet: Senden an den eigenen Client
    /// fehlgeschlagen, Verbindung abbauen.
    async fn relay_frame(
        &self,
        framed: &mut Framed<TcpStream, FrameCodec>,
        raum_id: RaumId,
        peer_id: &PeerId,
        bytes: &BytesMut,
    ) -> std::io::Result<()> {
        match serde_json::from_slice::<ClientFrame>(bytes) {
            Ok(ClientFrame::Sdp { to_id, payload }) => {
                let frame = ServerFrame::Sdp {
                    from_id: peer_id.clone(),
                    payload,
                };
                if !self.state.registry.an_peer_senden(raum_id, &to_id, frame) {
                    tracing::trace!(raum_id = %raum_id, to_id = %to_id, "SDP-Ziel nicht gefunden – verworfen");
                }
            }
            Ok(ClientFrame::Ice { to_id, payload }) => {
                let frame = ServerFrame::Ice {
                    from_id: peer_id.clone(),
                    payload,
                };
                if !self.state.registry.an_peer_senden(raum_id, &to_id, frame) {
                    tracing::trace!(raum_id = %raum_id, to_id = %to_id, "ICE-Ziel nicht gefunden – verworfen");
                }
            }
            Ok(ClientFrame::RefreshUsers) => {
                // Nicht relayen: lokal mit der aktuellen Mitgliederliste
                // antworten, ohne den Anfragenden selbst
                let mitglieder = self
                    .state
                    .registry
                    .mitglieder(raum_id)
                    .into_iter()
                    .filter(|info| &info.id != peer_id)
                    .collect();
                framed
                    .send(ServerFrame::RoomState {
                        payload: mitglieder,
                    })
                    .await?;
            }
            Ok(_) => {
                tracing::trace!(peer_id = %peer_id, "Frame-Art im Relay-Betrieb nicht erlaubt – verworfen");
            }
            Err(e) => {
                tracing::trace!(peer_id = %peer_id, fehler = %e, "Unlesbares Frame verworfen");
            }
        }
        Ok(())
    }

    /// Lobby-Sitzung: abonniert nur Raumlisten-Benachrichtigungen
    ///
    /// Eingehender Verkehr dient ausschliesslich als Keep-Alive und wird
    /// verworfen.
    async fn lobby_sitzung(
        &self,
        framed: &mut Framed<TcpStream, FrameCodec>,
        peer_id: PeerId,
        anzeige_name: String,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut empfang = match self.state.registry.lobby_beitreten(&peer_id, &anzeige_name) {
            Ok(rx) => rx,
            Err(e) => {
                tracing::info!(peer_id = %peer_id, fehler = %e, "Lobby-Beitritt abgelehnt");
                verabschieden(framed, CloseCode::DoppelterPeer).await;
                return;
            }
        };
        tracing::debug!(peer = %self.peer_addr, peer_id = %peer_id, "Lobby-Sitzung beginnt");

        loop {
            tokio::select! {
                frame = framed.next() => match frame {
                    Some(Ok(_)) => { /* Keep-Alive – Inhalt wird verworfen */ }
                    Some(Err(e)) => {
                        tracing::warn!(peer_id = %peer_id, fehler = %e, "Frame-Lesefehler in der Lobby");
                        break;
                    }
                    None => break,
                },

                ausgehend = empfang.recv() => match ausgehend {
                    Some(frame) => {
                        if framed.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.state.registry.lobby_verlassen(&peer_id);
        tracing::debug!(peer_id = %peer_id, "Lobby-Sitzung beendet");
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Sendet das Abschieds-Frame mit Schliess-Code und Grund
///
/// Das TCP-Gegenstueck zum WebSocket-Close-Handshake: ein letztes
/// `close`-Frame, danach wird der Stream fallen gelassen.
async fn verabschieden(framed: &mut Framed<TcpStream, FrameCodec>, code: CloseCode) {
    if let Err(e) = framed.send(ServerFrame::schliessen(code)).await {
        tracing::debug!(code = code.code(), fehler = %e, "Abschieds-Frame nicht zustellbar");
    }
}
