// docbridge-core/src/connection.rs
//! Lifecycle of the driver client.
//!
//! ```text
//!   Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!        ▲                        │                  │
//!        └────────── err ─────────┘                close
//!                                                    ▼
//!   Connected ◀──acquire (auto_reconnect)────────  Closed
//! ```
//!
//! The state flag is an atomic so it can be read without locking. Connection
//! attempts are serialised through an async gate; the fast path (a live
//! client already stored) only takes a short read lock.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::Client;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{DocBridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConnectionState {
    /// No client yet, or the last attempt failed
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    /// Explicitly closed by the caller
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Snapshot of the connection for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub state: ConnectionState,
    pub database: String,
    pub connected_at: Option<DateTime<Utc>>,
    /// Number of driver clients created so far (first connect included)
    pub connect_count: u64,
}

pub struct Connection {
    config: ClientConfig,
    client: RwLock<Option<Client>>,
    state: AtomicU8,
    connected_at: RwLock<Option<DateTime<Utc>>>,
    connect_count: AtomicU64,
    gate: tokio::sync::Mutex<()>,
}

impl Connection {
    /// No I/O happens until `connect` or `acquire`.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            connected_at: RwLock::new(None),
            connect_count: AtomicU64::new(0),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            state: self.state(),
            database: self.config.database_name.clone(),
            connected_at: *self.connected_at.read(),
            connect_count: self.connect_count.load(Ordering::Relaxed),
        }
    }

    /// Connect now. A no-op when a live client is already stored.
    pub async fn connect(&self) -> Result<()> {
        self.establish().await.map(|_| ())
    }

    /// Live client, connecting on demand.
    ///
    /// After an explicit [`Connection::close`] this reconnects only when
    /// `auto_reconnect` is enabled.
    pub async fn acquire(&self) -> Result<Client> {
        let existing = self.client.read().clone();
        if let Some(client) = existing {
            return Ok(client);
        }

        if self.state() == ConnectionState::Closed && !self.config.auto_reconnect {
            return Err(DocBridgeError::NotConnected(
                "connection was closed and auto_reconnect is disabled".into(),
            ));
        }

        self.establish().await
    }

    async fn establish(&self) -> Result<Client> {
        let _gate = self.gate.lock().await;

        // Another caller may have connected while we waited
        let existing = self.client.read().clone();
        if let Some(client) = existing {
            return Ok(client);
        }

        let previous = self.state();
        if previous == ConnectionState::Closed {
            debug!(database = %self.config.database_name, "reconnecting after close");
        }
        self.set_state(ConnectionState::Connecting);

        match self.open().await {
            Ok(client) => {
                *self.client.write() = Some(client.clone());
                *self.connected_at.write() = Some(Utc::now());
                let count = self.connect_count.fetch_add(1, Ordering::Relaxed) + 1;
                self.set_state(ConnectionState::Connected);
                info!(
                    database = %self.config.database_name,
                    connect_count = count,
                    "connected to MongoDB"
                );
                Ok(client)
            }
            Err(err) => {
                let fallback = if previous == ConnectionState::Closed {
                    ConnectionState::Closed
                } else {
                    ConnectionState::Disconnected
                };
                self.set_state(fallback);
                warn!(database = %self.config.database_name, error = %err, "connection failed");
                Err(err)
            }
        }
    }

    async fn open(&self) -> Result<Client> {
        let options = self.config.client_options().await?;
        let client = Client::with_options(options)?;

        if self.config.verify_connection {
            client
                .database(&self.config.database_name)
                .run_command(doc! { "ping": 1 })
                .await?;
        }

        Ok(client)
    }

    /// Drop the client and mark the connection closed. Idempotent.
    pub async fn close(&self) {
        let _gate = self.gate.lock().await;

        let client = self.client.write().take();
        *self.connected_at.write() = None;
        self.set_state(ConnectionState::Closed);

        if let Some(client) = client {
            client.shutdown().immediate(true).await;
            info!(database = %self.config.database_name, "connection closed");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.config.database_name)
            .field("state", &self.state())
            .finish()
    }
}
