//! treffpunkt-server – Bibliotheks-Root
//!
//! Verdrahtet alle Subsysteme: Raum-Verzeichnis (SQLite), REST-API,
//! Signaling-Server und Raum-Bereinigung.

pub mod api;
pub mod config;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use treffpunkt_db::{DatabaseConfig, SqliteDb};
use treffpunkt_signaling::{
    BereinigungsKonfig, ConnectionRegistry, RaumBereinigung, SignalingServer, SignalingState,
};

use config::ServerConfig;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Raum-Verzeichnis oeffnen (SQLite, Migrationen)
    /// 2. Raum-Bereinigung als Hintergrund-Task starten
    /// 3. REST-API starten (Raum-Verwaltung)
    /// 4. Signaling-Listener starten (blockiert bis zum Shutdown)
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            signaling = %self.config.signaling_bind_adresse(),
            api = %self.config.api_bind_adresse(),
            "Server startet"
        );

        // Raum-Verzeichnis
        let db_konfig = DatabaseConfig {
            url: self.config.datenbank.url.clone(),
            max_verbindungen: self.config.datenbank.max_verbindungen,
            sqlite_wal: true,
        };
        let db = Arc::new(
            SqliteDb::oeffnen(&db_konfig)
                .await
                .context("Raum-Verzeichnis nicht oeffenbar")?,
        );

        let registry = ConnectionRegistry::neu();
        let state = SignalingState::neu(Arc::clone(&db), registry.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Raum-Bereinigung
        let bereinigungs_konfig = BereinigungsKonfig::neu(
            Duration::from_secs(self.config.bereinigung.intervall_sek),
            Duration::from_secs(self.config.bereinigung.inaktivitaets_timeout_sek),
        )?;
        let bereinigung =
            RaumBereinigung::neu(Arc::clone(&db), registry.clone(), bereinigungs_konfig);
        let bereinigung_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = bereinigung.lauf(bereinigung_shutdown).await {
                tracing::error!(
                    fehler = %e,
                    "Raum-Bereinigung abgebrochen – Neustart des Servers erforderlich"
                );
            }
        });

        // REST-API
        let api_state = api::ApiState {
            verzeichnis: Arc::clone(&db),
            registry: registry.clone(),
        };
        let api_adresse = self.config.api_bind_adresse();
        let api_listener = tokio::net::TcpListener::bind(&api_adresse)
            .await
            .with_context(|| format!("API-Adresse nicht bindbar: {api_adresse}"))?;
        tracing::info!(adresse = %api_adresse, "REST-API gestartet");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(api_listener, api::router(api_state)).await {
                tracing::error!(fehler = %e, "REST-API beendet");
            }
        });

        // Shutdown auf Ctrl-C
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown-Signal empfangen");
                let _ = shutdown_tx.send(true);
            }
        });

        // Signaling-Listener (blockiert bis zum Shutdown)
        let signaling_adresse: SocketAddr = self
            .config
            .signaling_bind_adresse()
            .parse()
            .context("Ungueltige Signaling-Bind-Adresse")?;
        let signaling = SignalingServer::neu(state, signaling_adresse);
        signaling
            .starten(shutdown_rx)
            .await
            .context("Signaling-Server fehlgeschlagen")?;

        Ok(())
    }
}
