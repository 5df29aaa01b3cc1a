//! Integration-Tests fuer die Signaling-Sitzung
//!
//! Fahren den kompletten Pfad ueber echte TCP-Sockets und den
//! Frame-Codec: Adressierung, Authentifizierung, Beitritt, Relay,
//! Trennung. Das Raum-Verzeichnis ist eine In-Memory-SQLite-Datenbank.

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use treffpunkt_core::{passwort::passwort_hash, RaumId};
use treffpunkt_db::{NeuerRaum, RaumRepository, SqliteDb};
use treffpunkt_protocol::{
    signal::{ClientFrame, CredentialFrame, RaumEvent, ServerFrame},
    wire::FrameCodec,
};
use treffpunkt_signaling::{ConnectionRegistry, SignalingSession, SignalingState};

type Client = Framed<TcpStream, FrameCodec>;

struct TestUmgebung {
    state: Arc<SignalingState<SqliteDb>>,
    db: Arc<SqliteDb>,
    addr: SocketAddr,
    // Haelt den watch-Sender am Leben solange die Umgebung existiert
    _shutdown_tx: watch::Sender<bool>,
}

/// Startet einen Accept-Task der jede Verbindung als Sitzung verarbeitet
async fn umgebung_starten() -> TestUmgebung {
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let registry = ConnectionRegistry::neu();
    let state = SignalingState::neu(Arc::clone(&db), registry);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let accept_state = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            let Ok((stream, peer_addr)) = listener.accept().await else {
                break;
            };
            let sitzung = SignalingSession::neu(Arc::clone(&accept_state), peer_addr);
            let sitzung_shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                sitzung.verarbeiten(stream, sitzung_shutdown).await;
            });
        }
    });

    TestUmgebung {
        state,
        db,
        addr,
        _shutdown_tx: shutdown_tx,
    }
}

async fn verbinden(addr: SocketAddr) -> Client {
    let stream = TcpStream::connect(addr).await.unwrap();
    Framed::new(stream, FrameCodec::new())
}

async fn naechstes_frame(client: &mut Client) -> ServerFrame {
    let bytes: BytesMut = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("Zeitlimit beim Warten auf ein Frame")
        .expect("Verbindung unerwartet beendet")
        .expect("Lesefehler");
    serde_json::from_slice(&bytes).expect("ServerFrame erwartet")
}

async fn erwartet_verbindungsende(client: &mut Client) {
    let ergebnis = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("Zeitlimit beim Warten auf das Verbindungsende");
    assert!(ergebnis.is_none(), "Verbindungsende erwartet");
}

/// Prueft dass innerhalb der Frist kein Frame eintrifft
async fn erwartet_stille(client: &mut Client) {
    let ergebnis = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(ergebnis.is_err(), "Unerwartetes Frame empfangen");
}

async fn raum_beitreten(client: &mut Client, room_id: RaumId, peer_id: &str, name: &str, passwort: &str) {
    client
        .send(ClientFrame::Join {
            room_id,
            peer_id: peer_id.into(),
            display_name: name.into(),
        })
        .await
        .unwrap();
    client
        .send(CredentialFrame {
            password: passwort.into(),
        })
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Szenario: Raum ohne Passwort
// ---------------------------------------------------------------------------

#[tokio::test]
async fn szenario_beitritt_relay_und_trennung() {
    let umgebung = umgebung_starten().await;
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "A",
            password_hash: None,
        })
        .await
        .unwrap();

    // p1 tritt bei und sieht einen leeren Raum
    let mut p1 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p1, raum.id, "p1", "Alice", "").await;
    match naechstes_frame(&mut p1).await {
        ServerFrame::RoomState { payload } => assert!(payload.is_empty()),
        andere => panic!("room_state erwartet, war {andere:?}"),
    }

    // p2 tritt bei: p2 sieht [p1], p1 sieht new_peer p2
    let mut p2 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p2, raum.id, "p2", "Bob", "").await;
    match naechstes_frame(&mut p2).await {
        ServerFrame::RoomState { payload } => {
            assert_eq!(payload.len(), 1);
            assert_eq!(payload[0].id.als_str(), "p1");
            assert_eq!(payload[0].name, "Alice");
        }
        andere => panic!("room_state erwartet, war {andere:?}"),
    }
    match naechstes_frame(&mut p1).await {
        ServerFrame::NewPeer { payload } => {
            assert_eq!(payload.id.als_str(), "p2");
            assert_eq!(payload.name, "Bob");
        }
        andere => panic!("new_peer erwartet, war {andere:?}"),
    }

    // Gerichtetes SDP von p1 an p2, gestempelt mit from_id = p1
    p1.send(ClientFrame::Sdp {
        to_id: "p2".into(),
        payload: json!({"sdp": "offer", "typ": "offer"}),
    })
    .await
    .unwrap();
    match naechstes_frame(&mut p2).await {
        ServerFrame::Sdp { from_id, payload } => {
            assert_eq!(from_id.als_str(), "p1");
            assert_eq!(payload["sdp"], "offer");
        }
        andere => panic!("sdp erwartet, war {andere:?}"),
    }
    // Der Absender selbst bekommt nichts zurueck
    erwartet_stille(&mut p1).await;

    // p1 trennt: p2 sieht peer_left, der Raum schrumpft auf ein Mitglied
    drop(p1);
    match naechstes_frame(&mut p2).await {
        ServerFrame::PeerLeft { payload } => assert_eq!(payload.id.als_str(), "p1"),
        andere => panic!("peer_left erwartet, war {andere:?}"),
    }
    assert_eq!(umgebung.state.registry.mitglieder_anzahl(raum.id), 1);
}

#[tokio::test]
async fn sdp_erreicht_keine_unbeteiligten() {
    let umgebung = umgebung_starten().await;
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "A",
            password_hash: None,
        })
        .await
        .unwrap();

    let mut p1 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p1, raum.id, "p1", "Alice", "").await;
    let _ = naechstes_frame(&mut p1).await; // room_state

    let mut p2 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p2, raum.id, "p2", "Bob", "").await;
    let _ = naechstes_frame(&mut p2).await; // room_state
    let _ = naechstes_frame(&mut p1).await; // new_peer p2

    let mut p3 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p3, raum.id, "p3", "Carol", "").await;
    let _ = naechstes_frame(&mut p3).await; // room_state
    let _ = naechstes_frame(&mut p1).await; // new_peer p3
    let _ = naechstes_frame(&mut p2).await; // new_peer p3

    p1.send(ClientFrame::Ice {
        to_id: "p2".into(),
        payload: json!({"candidate": "xyz"}),
    })
    .await
    .unwrap();

    match naechstes_frame(&mut p2).await {
        ServerFrame::Ice { from_id, .. } => assert_eq!(from_id.als_str(), "p1"),
        andere => panic!("ice erwartet, war {andere:?}"),
    }
    erwartet_stille(&mut p3).await;
}

#[tokio::test]
async fn relay_an_getrenntes_ziel_wird_verworfen() {
    let umgebung = umgebung_starten().await;
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "A",
            password_hash: None,
        })
        .await
        .unwrap();

    let mut p1 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p1, raum.id, "p1", "Alice", "").await;
    let _ = naechstes_frame(&mut p1).await;

    // Ziel existiert nicht (mehr): Frame verschwindet lautlos, die
    // Sitzung bleibt bestehen
    p1.send(ClientFrame::Sdp {
        to_id: "niemand".into(),
        payload: json!({"sdp": "offer"}),
    })
    .await
    .unwrap();
    erwartet_stille(&mut p1).await;

    // Die Sitzung funktioniert weiterhin
    p1.send(ClientFrame::RefreshUsers).await.unwrap();
    match naechstes_frame(&mut p1).await {
        ServerFrame::RoomState { payload } => assert!(payload.is_empty()),
        andere => panic!("room_state erwartet, war {andere:?}"),
    }
}

#[tokio::test]
async fn unbekannte_frames_beenden_die_sitzung_nicht() {
    let umgebung = umgebung_starten().await;
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "A",
            password_hash: None,
        })
        .await
        .unwrap();

    let mut p1 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p1, raum.id, "p1", "Alice", "").await;
    let _ = naechstes_frame(&mut p1).await;

    // Unbekannte Frame-Art und kaputtes JSON werden beide verworfen
    p1.send(json!({"type": "chat", "text": "hallo"})).await.unwrap();
    p1.send(json!({"to_id": "p2"})).await.unwrap();
    erwartet_stille(&mut p1).await;

    p1.send(ClientFrame::RefreshUsers).await.unwrap();
    assert!(matches!(
        naechstes_frame(&mut p1).await,
        ServerFrame::RoomState { .. }
    ));
}

#[tokio::test]
async fn refresh_users_liefert_mitglieder_ohne_anfragenden() {
    let umgebung = umgebung_starten().await;
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "A",
            password_hash: None,
        })
        .await
        .unwrap();

    let mut p1 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p1, raum.id, "p1", "Alice", "").await;
    let _ = naechstes_frame(&mut p1).await;

    let mut p2 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p2, raum.id, "p2", "Bob", "").await;
    let _ = naechstes_frame(&mut p2).await;
    let _ = naechstes_frame(&mut p1).await; // new_peer p2

    p1.send(ClientFrame::RefreshUsers).await.unwrap();
    match naechstes_frame(&mut p1).await {
        ServerFrame::RoomState { payload } => {
            assert_eq!(payload.len(), 1);
            assert_eq!(payload[0].id.als_str(), "p2");
        }
        andere => panic!("room_state erwartet, war {andere:?}"),
    }
}

// ---------------------------------------------------------------------------
// Authentifizierung
// ---------------------------------------------------------------------------

#[tokio::test]
async fn falsches_passwort_schliesst_mit_4000_ohne_registrierung() {
    let umgebung = umgebung_starten().await;
    let digest = passwort_hash("geheim");
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "B",
            password_hash: Some(&digest),
        })
        .await
        .unwrap();

    let mut client = verbinden(umgebung.addr).await;
    raum_beitreten(&mut client, raum.id, "p1", "Alice", "falsch").await;

    match naechstes_frame(&mut client).await {
        ServerFrame::Close { code, reason } => {
            assert_eq!(code, 4000);
            assert_eq!(reason, "Falsches Passwort");
        }
        andere => panic!("close erwartet, war {andere:?}"),
    }
    erwartet_verbindungsende(&mut client).await;

    // Die Registry hat den Peer nie gesehen
    assert_eq!(umgebung.state.registry.mitglieder_anzahl(raum.id), 0);
    assert!(!umgebung.state.registry.ist_raum_registriert(raum.id));
}

#[tokio::test]
async fn richtiges_passwort_fuehrt_zum_beitritt() {
    let umgebung = umgebung_starten().await;
    let digest = passwort_hash("geheim");
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "B",
            password_hash: Some(&digest),
        })
        .await
        .unwrap();

    let mut client = verbinden(umgebung.addr).await;
    raum_beitreten(&mut client, raum.id, "p1", "Alice", "geheim").await;

    assert!(matches!(
        naechstes_frame(&mut client).await,
        ServerFrame::RoomState { .. }
    ));
    assert_eq!(umgebung.state.registry.mitglieder_anzahl(raum.id), 1);
}

#[tokio::test]
async fn unlesbares_credential_schliesst_mit_4001() {
    let umgebung = umgebung_starten().await;
    let digest = passwort_hash("geheim");
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "B",
            password_hash: Some(&digest),
        })
        .await
        .unwrap();

    let mut client = verbinden(umgebung.addr).await;
    client
        .send(ClientFrame::Join {
            room_id: raum.id,
            peer_id: "p1".into(),
            display_name: "Alice".into(),
        })
        .await
        .unwrap();
    // Kein JSON-Objekt: bei einem passwortgeschuetzten Raum ein Auth-Fehler
    client.send(json!(["kein", "objekt"])).await.unwrap();

    match naechstes_frame(&mut client).await {
        ServerFrame::Close { code, .. } => assert_eq!(code, 4001),
        andere => panic!("close erwartet, war {andere:?}"),
    }
}

#[tokio::test]
async fn raum_ohne_passwort_akzeptiert_beliebiges_credential() {
    let umgebung = umgebung_starten().await;
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "A",
            password_hash: None,
        })
        .await
        .unwrap();

    // Das Credential-Frame wird konsumiert aber nie interpretiert
    let mut client = verbinden(umgebung.addr).await;
    client
        .send(ClientFrame::Join {
            room_id: raum.id,
            peer_id: "p1".into(),
            display_name: "Alice".into(),
        })
        .await
        .unwrap();
    client.send(json!({"voellig": "beliebig"})).await.unwrap();

    assert!(matches!(
        naechstes_frame(&mut client).await,
        ServerFrame::RoomState { .. }
    ));
}

#[tokio::test]
async fn unbekannter_raum_schliesst_mit_4004() {
    let umgebung = umgebung_starten().await;

    let mut client = verbinden(umgebung.addr).await;
    client
        .send(ClientFrame::Join {
            room_id: RaumId(999),
            peer_id: "p1".into(),
            display_name: "Alice".into(),
        })
        .await
        .unwrap();

    match naechstes_frame(&mut client).await {
        ServerFrame::Close { code, reason } => {
            assert_eq!(code, 4004);
            assert_eq!(reason, "Raum nicht gefunden");
        }
        andere => panic!("close erwartet, war {andere:?}"),
    }
    erwartet_verbindungsende(&mut client).await;
}

#[tokio::test]
async fn doppelte_peer_id_schliesst_mit_4009() {
    let umgebung = umgebung_starten().await;
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "A",
            password_hash: None,
        })
        .await
        .unwrap();

    let mut p1 = verbinden(umgebung.addr).await;
    raum_beitreten(&mut p1, raum.id, "p1", "Alice", "").await;
    let _ = naechstes_frame(&mut p1).await;

    let mut eindringling = verbinden(umgebung.addr).await;
    raum_beitreten(&mut eindringling, raum.id, "p1", "Zweiter", "").await;
    match naechstes_frame(&mut eindringling).await {
        ServerFrame::Close { code, .. } => assert_eq!(code, 4009),
        andere => panic!("close erwartet, war {andere:?}"),
    }

    // Die urspruengliche Sitzung bleibt unberuehrt
    assert_eq!(umgebung.state.registry.mitglieder_anzahl(raum.id), 1);
    p1.send(ClientFrame::RefreshUsers).await.unwrap();
    assert!(matches!(
        naechstes_frame(&mut p1).await,
        ServerFrame::RoomState { .. }
    ));
}

#[tokio::test]
async fn beitritt_aktualisiert_die_raum_aktivitaet() {
    let umgebung = umgebung_starten().await;
    let raum = umgebung
        .db
        .erstellen(NeuerRaum {
            name: "A",
            password_hash: None,
        })
        .await
        .unwrap();

    // Aktivitaet kuenstlich altern lassen
    let alt = chrono::Utc::now() - chrono::Duration::seconds(900);
    umgebung
        .db
        .aktivitaet_aktualisieren(raum.id, alt)
        .await
        .unwrap();

    let mut client = verbinden(umgebung.addr).await;
    raum_beitreten(&mut client, raum.id, "p1", "Alice", "").await;
    let _ = naechstes_frame(&mut client).await;

    // Der Zeitstempel wird nach dem room_state-Frame geschrieben
    let mut versuche = 0;
    loop {
        let geladen = umgebung.db.laden(raum.id).await.unwrap().unwrap();
        if geladen.last_activity > alt + chrono::Duration::seconds(60) {
            break;
        }
        versuche += 1;
        assert!(versuche < 50, "Aktivitaet wurde nicht aktualisiert");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// Lobby-Sitzungen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lobby_sitzung_empfaengt_raumlisten_aenderungen() {
    let umgebung = umgebung_starten().await;

    let mut beobachter = verbinden(umgebung.addr).await;
    beobachter
        .send(ClientFrame::Lobby {
            peer_id: "l1".into(),
            display_name: "Beobachter".into(),
        })
        .await
        .unwrap();

    // Eingehender Verkehr ist reines Keep-Alive
    beobachter.send(json!({"irgendwas": true})).await.unwrap();
    erwartet_stille(&mut beobachter).await;

    // Registrierung abwarten, dann eine Aenderung ausloesen
    let mut versuche = 0;
    while umgebung.state.registry.lobby_anzahl() == 0 && versuche < 50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        versuche += 1;
    }
    assert_eq!(umgebung.state.registry.lobby_anzahl(), 1);

    umgebung.state.registry.lobby_broadcast(ServerFrame::RoomsUpdated {
        event: RaumEvent::RoomCreated,
    });

    assert!(matches!(
        naechstes_frame(&mut beobachter).await,
        ServerFrame::RoomsUpdated {
            event: RaumEvent::RoomCreated
        }
    ));
}

#[tokio::test]
async fn lobby_trennung_raeumt_die_mitgliedschaft_auf() {
    let umgebung = umgebung_starten().await;

    let mut beobachter = verbinden(umgebung.addr).await;
    beobachter
        .send(ClientFrame::Lobby {
            peer_id: "l1".into(),
            display_name: "Beobachter".into(),
        })
        .await
        .unwrap();

    let mut versuche = 0;
    while umgebung.state.registry.lobby_anzahl() == 0 && versuche < 50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        versuche += 1;
    }
    assert_eq!(umgebung.state.registry.lobby_anzahl(), 1);

    drop(beobachter);
    let mut versuche = 0;
    while umgebung.state.registry.lobby_anzahl() > 0 && versuche < 50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        versuche += 1;
    }
    assert_eq!(umgebung.state.registry.lobby_anzahl(), 0);
}
