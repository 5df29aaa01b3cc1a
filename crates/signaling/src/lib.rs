//! treffpunkt-signaling – Verbindungs-Registry und Relay
//!
//! Dieser Crate implementiert den Signaling-Kern von Treffpunkt: er
//! verwaltet die TCP-Verbindungen aller Peers, authentifiziert sie gegen
//! das Raum-Verzeichnis und reicht SDP/ICE-Frames zwischen Peers im
//! selben Raum weiter.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! SignalingSession (pro Verbindung ein Task)
//!     |  State Machine: Verbindet -> Authentifizierung -> Beigetreten -> Getrennt
//!     |  Lobby-Variante: nur Raumlisten-Benachrichtigungen
//!     v
//! ConnectionRegistry – wer ist in welchem Raum, wer schaut die Raumliste
//!
//! RaumBereinigung – loescht leere, inaktive Raeume im Hintergrund
//! ```
//!
//! Saemtlicher veraenderlicher In-Memory-Zustand lebt ausschliesslich in
//! der [`ConnectionRegistry`]; Sitzungen und Bereinigung greifen nur ueber
//! deren Operationen darauf zu.

pub mod bereinigung;
pub mod error;
pub mod registry;
pub mod server_state;
pub mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use bereinigung::{BereinigungsKonfig, RaumBereinigung};
pub use error::{SignalingError, SignalingResult};
pub use registry::ConnectionRegistry;
pub use server_state::SignalingState;
pub use session::{SignalingSession, SitzungsZustand};
pub use tcp::SignalingServer;
