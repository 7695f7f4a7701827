//! Test utilities shared by the integration suites.
//!
//! Provides an in-memory SQLite database with migrations applied, a running
//! server bound to a random port, and fixture helpers.

#![allow(dead_code)]

use std::net::SocketAddr;

use anyhow::Result;
use bonushub::config::AppConfig;
use bonushub::server::{AppState, create_app};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// A server running on `127.0.0.1` with a random port.
///
/// Dropping the server without calling [`TestServer::shutdown`] leaves the
/// task running until the runtime stops.
pub struct TestServer {
    pub base_url: String,
    pub db: DatabaseConnection,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start the full application with `config` over a fresh database.
    pub async fn start(config: AppConfig) -> Result<Self> {
        let db = setup_test_db().await?;
        let state = AppState::new(config, db.clone())?;
        let app = create_app(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            db,
            shutdown: Some(tx),
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Signal graceful shutdown and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

/// Body for `POST /api/bonus-sites`.
pub fn site_body(name: &str, amount: &str, turnover: f64, rating: f64) -> Value {
    json!({
        "name": name,
        "bonus_amount": amount,
        "turnover_requirement": turnover,
        "rating": rating,
        "affiliate_url": format!("https://partner.example/{}", name.to_lowercase())
    })
}

/// Extract the `id` field of a created resource.
pub fn id_of(body: &Value) -> Uuid {
    body["id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("response carries a uuid id")
}

/// One upstream event in the odds API wire format.
pub fn odds_event(id: &str, home: &str, away: &str, commence_time: &str, completed: bool) -> Value {
    json!({
        "id": id,
        "sport_key": "soccer_turkey_super_league",
        "sport_title": "Turkey Super League",
        "commence_time": commence_time,
        "completed": completed,
        "home_team": home,
        "away_team": away,
        "scores": if completed {
            json!([{ "name": home, "score": "2" }, { "name": away, "score": "1" }])
        } else {
            Value::Null
        }
    })
}
