//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt das Raum-Verzeichnis und die Verbindungs-Registry als
//! Arc-Referenzen, die sicher zwischen tokio-Tasks geteilt werden koennen.

use std::sync::Arc;
use treffpunkt_db::RaumRepository;

use crate::registry::ConnectionRegistry;

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState<R>
where
    R: RaumRepository + 'static,
{
    /// Dauerhaftes Raum-Verzeichnis
    pub verzeichnis: Arc<R>,
    /// In-Memory Verbindungs-Registry
    pub registry: ConnectionRegistry,
}

impl<R> SignalingState<R>
where
    R: RaumRepository + 'static,
{
    /// Erstellt einen neuen SignalingState
    pub fn neu(verzeichnis: Arc<R>, registry: ConnectionRegistry) -> Arc<Self> {
        Arc::new(Self {
            verzeichnis,
            registry,
        })
    }
}
