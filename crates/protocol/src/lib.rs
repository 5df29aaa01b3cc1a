//! treffpunkt-protocol – Wire-Format des Signaling-Protokolls
//!
//! Definiert alle Frames die zwischen Client und Server ausgetauscht
//! werden sowie den Frame-Codec (Laengenpraefix + JSON) fuer die
//! TCP-Verbindung.

pub mod signal;
pub mod wire;

// Bequeme Re-Exporte
pub use signal::{ClientFrame, CloseCode, CredentialFrame, PeerInfo, PeerRef, RaumEvent, ServerFrame};
pub use wire::FrameCodec;
