//! Passwort-Digest fuer Raum-Passwoerter
//!
//! Raum-Passwoerter werden nie im Klartext gespeichert. Beim Anlegen eines
//! Raums wird der SHA-256-Digest (hex-kodiert, Kleinbuchstaben) abgelegt;
//! bei der Authentifizierung wird das gelieferte Passwort mit demselben
//! Digest gehasht und byte-fuer-byte verglichen.

use sha2::{Digest, Sha256};

/// Laenge des hex-kodierten Digests in Zeichen
pub const HASH_LAENGE: usize = 64;

/// Berechnet den hex-kodierten SHA-256-Digest eines Passworts
pub fn passwort_hash(passwort: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(passwort.as_bytes());
    let mut hex = String::with_capacity(HASH_LAENGE);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Prueft ein Klartext-Passwort gegen einen gespeicherten Digest
pub fn passwort_pruefen(passwort: &str, hash: &str) -> bool {
    passwort_hash(passwort) == hash
}
