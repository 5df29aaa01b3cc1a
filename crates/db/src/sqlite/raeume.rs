//! SQLite-Implementierung des RaumRepository

use chrono::{DateTime, Utc};
use sqlx::Row;
use treffpunkt_core::RaumId;

use crate::error::DbError;
use crate::models::{NeuerRaum, RaumRecord};
use crate::repository::{DbResult, RaumRepository};
use crate::sqlite::pool::SqliteDb;

/// Konvertiert eine Datenbankzeile in einen RaumRecord
fn row_to_raum(row: &sqlx::sqlite::SqliteRow) -> DbResult<RaumRecord> {
    let zeit_str: String = row.get("last_activity");
    let last_activity = DateTime::parse_from_rfc3339(&zeit_str)
        .map_err(|e| DbError::UngueltigeDaten(format!("last_activity nicht parsebar: {e}")))?
        .with_timezone(&Utc);

    Ok(RaumRecord {
        id: RaumId(row.get("id")),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        last_activity,
    })
}

impl RaumRepository for SqliteDb {
    async fn erstellen(&self, daten: NeuerRaum<'_>) -> DbResult<RaumRecord> {
        let jetzt = Utc::now();

        let ergebnis =
            sqlx::query("INSERT INTO rooms (name, password_hash, last_activity) VALUES (?, ?, ?)")
                .bind(daten.name)
                .bind(daten.password_hash)
                .bind(jetzt.to_rfc3339())
                .execute(&self.pool)
                .await;

        match ergebnis {
            Ok(r) => Ok(RaumRecord {
                id: RaumId(r.last_insert_rowid()),
                name: daten.name.to_string(),
                password_hash: daten.password_hash.map(|s| s.to_string()),
                last_activity: jetzt,
            }),
            Err(e) => {
                let fehler = DbError::from(e);
                if fehler.ist_eindeutigkeit() {
                    Err(DbError::Eindeutigkeit(format!(
                        "Raum '{}' existiert bereits",
                        daten.name
                    )))
                } else {
                    Err(fehler)
                }
            }
        }
    }

    async fn laden(&self, id: RaumId) -> DbResult<Option<RaumRecord>> {
        let row = sqlx::query(
            "SELECT id, name, password_hash, last_activity FROM rooms WHERE id = ?",
        )
        .bind(id.inner())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_raum(&r)).transpose()
    }

    async fn alle(&self) -> DbResult<Vec<RaumRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, password_hash, last_activity FROM rooms ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_raum).collect()
    }

    async fn aktivitaet_aktualisieren(
        &self,
        id: RaumId,
        zeitpunkt: DateTime<Utc>,
    ) -> DbResult<()> {
        let ergebnis = sqlx::query("UPDATE rooms SET last_activity = ? WHERE id = ?")
            .bind(zeitpunkt.to_rfc3339())
            .bind(id.inner())
            .execute(&self.pool)
            .await?;

        if ergebnis.rows_affected() == 0 {
            return Err(DbError::nicht_gefunden(format!("Raum {id}")));
        }
        Ok(())
    }

    async fn loeschen(&self, id: RaumId) -> DbResult<bool> {
        let ergebnis = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id.inner())
            .execute(&self.pool)
            .await?;

        Ok(ergebnis.rows_affected() > 0)
    }
}
