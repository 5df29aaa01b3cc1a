//! REST-Schnittstelle fuer das Raum-Verzeichnis
//!
//! Zwei Endpunkte: Raum anlegen und Raumliste abrufen. Das Anlegen
//! benachrichtigt alle Lobby-Verbindungen ueber die Registry.
//!
//! Der Passwort-Digest wird bereits hier berechnet; das Verzeichnis
//! sieht nie ein Klartext-Passwort.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use treffpunkt_core::passwort::passwort_hash;
use treffpunkt_db::{NeuerRaum, RaumRepository, RaumUebersicht, SqliteDb};
use treffpunkt_protocol::signal::{RaumEvent, ServerFrame};
use treffpunkt_signaling::ConnectionRegistry;

/// Axum-State fuer die Raum-Verwaltung
#[derive(Clone)]
pub struct ApiState {
    pub verzeichnis: Arc<SqliteDb>,
    pub registry: ConnectionRegistry,
}

/// Erstellt den API-Router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/rooms", post(raum_erstellen).get(raum_liste))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RaumErstellenBody {
    pub name: String,
    pub password: Option<String>,
}

/// POST /api/rooms – legt einen neuen Raum an
pub async fn raum_erstellen(
    State(state): State<ApiState>,
    Json(body): Json<RaumErstellenBody>,
) -> Response {
    // Leeres Passwort zaehlt als "kein Passwort"
    let digest = body
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(passwort_hash);

    match state
        .verzeichnis
        .erstellen(NeuerRaum {
            name: &body.name,
            password_hash: digest.as_deref(),
        })
        .await
    {
        Ok(raum) => {
            tracing::info!(raum_id = %raum.id, name = %raum.name, "Raum angelegt");
            state.registry.lobby_broadcast(ServerFrame::RoomsUpdated {
                event: RaumEvent::RoomCreated,
            });
            (StatusCode::CREATED, Json(RaumUebersicht::from(&raum))).into_response()
        }
        Err(e) if e.ist_eindeutigkeit() => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("Raum '{}' existiert bereits", body.name)
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(fehler = %e, "Raum nicht anlegbar");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Interner Fehler"})),
            )
                .into_response()
        }
    }
}

/// GET /api/rooms – listet alle Raeume auf
pub async fn raum_liste(State(state): State<ApiState>) -> Response {
    match state.verzeichnis.alle().await {
        Ok(raeume) => {
            let liste: Vec<RaumUebersicht> = raeume.iter().map(RaumUebersicht::from).collect();
            (StatusCode::OK, Json(liste)).into_response()
        }
        Err(e) => {
            tracing::error!(fehler = %e, "Raumliste nicht ladbar");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Interner Fehler"})),
            )
                .into_response()
        }
    }
}
