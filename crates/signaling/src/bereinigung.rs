//! Raum-Bereinigung – Hintergrund-Dienst fuer verwaiste Raeume
//!
//! Ein Raum dessen letzter Peer gegangen ist bleibt absichtlich bestehen:
//! zwischen zwei aufeinanderfolgenden Beitritten darf er kurz leer sein.
//! Erst wenn er leer ist UND seine letzte Aktivitaet laenger als das
//! Inaktivitaets-Fenster zurueckliegt, loescht dieser Dienst den
//! dauerhaften Datensatz aus dem Verzeichnis.
//!
//! Hat ein Lauf mindestens einen Raum geloescht, erhaelt jede
//! Lobby-Verbindung genau ein `rooms_updated`-Frame – nicht eines pro
//! geloeschtem Raum.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use treffpunkt_db::RaumRepository;
use treffpunkt_protocol::signal::{RaumEvent, ServerFrame};

use crate::error::{SignalingError, SignalingResult};
use crate::registry::ConnectionRegistry;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration der Raum-Bereinigung
#[derive(Debug, Clone)]
pub struct BereinigungsKonfig {
    /// Abstand zwischen zwei Bereinigungslaeufen
    pub intervall: Duration,
    /// Inaktivitaets-Fenster nach dem ein leerer Raum als verwaist gilt
    pub inaktivitaets_timeout: Duration,
}

impl BereinigungsKonfig {
    /// Erstellt eine Konfiguration; beide Dauern muessen positiv sein
    pub fn neu(
        intervall: Duration,
        inaktivitaets_timeout: Duration,
    ) -> SignalingResult<Self> {
        if intervall.is_zero() {
            return Err(SignalingError::Konfiguration(
                "Bereinigungs-Intervall muss positiv sein".into(),
            ));
        }
        if inaktivitaets_timeout.is_zero() {
            return Err(SignalingError::Konfiguration(
                "Inaktivitaets-Timeout muss positiv sein".into(),
            ));
        }
        Ok(Self {
            intervall,
            inaktivitaets_timeout,
        })
    }
}

// ---------------------------------------------------------------------------
// RaumBereinigung
// ---------------------------------------------------------------------------

/// Hintergrund-Dienst der leere, inaktive Raeume loescht
pub struct RaumBereinigung<R>
where
    R: RaumRepository + 'static,
{
    verzeichnis: Arc<R>,
    registry: ConnectionRegistry,
    konfig: BereinigungsKonfig,
}

impl<R> RaumBereinigung<R>
where
    R: RaumRepository + 'static,
{
    /// Erstellt einen neuen Bereinigungs-Dienst
    pub fn neu(
        verzeichnis: Arc<R>,
        registry: ConnectionRegistry,
        konfig: BereinigungsKonfig,
    ) -> Self {
        Self {
            verzeichnis,
            registry,
            konfig,
        }
    }

    /// Laeuft bis zum Shutdown-Signal oder bis das Verzeichnis ausfaellt
    ///
    /// Fehler beim Loeschen einzelner Raeume brechen den Lauf nicht ab.
    /// Ein Fehler beim Auflisten gilt als Verzeichnis-Ausfall und beendet
    /// die Schleife mit einem Fehler – ueber den Neustart entscheidet der
    /// besitzende Prozess, der Fehler wird nie still verschluckt.
    pub async fn lauf(self, mut shutdown_rx: watch::Receiver<bool>) -> SignalingResult<()> {
        tracing::info!(
            intervall_sek = self.konfig.intervall.as_secs(),
            timeout_sek = self.konfig.inaktivitaets_timeout.as_secs(),
            "Raum-Bereinigung gestartet"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.konfig.intervall) => {}
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Raum-Bereinigung: Shutdown-Signal empfangen");
                        return Ok(());
                    }
                }
            }

            self.einmal_ausfuehren().await?;
        }
    }

    /// Fuehrt einen vollstaendigen Bereinigungslauf aus
    ///
    /// Gibt die Anzahl geloeschter Raeume zurueck.
    pub async fn einmal_ausfuehren(&self) -> SignalingResult<usize> {
        let raeume = self.verzeichnis.alle().await?;
        let jetzt = Utc::now();
        let mut geloescht = 0;

        for raum in raeume {
            if self.registry.mitglieder_anzahl(raum.id) > 0 {
                continue;
            }

            let verwaist = (jetzt - raum.last_activity)
                .to_std()
                .map(|alter| alter > self.konfig.inaktivitaets_timeout)
                .unwrap_or(false);
            if !verwaist {
                continue;
            }

            // Letzter Blick vor dem Loeschen: ein Beitritt kann sich mit
            // diesem Lauf ueberschneiden
            if self.registry.mitglieder_anzahl(raum.id) > 0 {
                continue;
            }

            match self.verzeichnis.loeschen(raum.id).await {
                Ok(true) => {
                    geloescht += 1;
                    tracing::info!(raum_id = %raum.id, name = %raum.name, "Verwaisten Raum geloescht");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(raum_id = %raum.id, fehler = %e, "Raum nicht loeschbar – Lauf wird fortgesetzt");
                }
            }
        }

        if geloescht > 0 {
            let benachrichtigt = self.registry.lobby_broadcast(ServerFrame::RoomsUpdated {
                event: RaumEvent::RoomDeleted,
            });
            tracing::debug!(geloescht, benachrichtigt, "Lobby ueber Raum-Loeschungen informiert");
        }

        Ok(geloescht)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
