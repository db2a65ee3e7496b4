//! Fleet watchdog (AMS) client for dedicated servers.
//!
//! The server reports `{"ready":{"dsid":..}}` once it can take players and then
//! `{"heartbeat":{}}` on a fixed interval. The watchdog may push
//! `{"drain":{..}}` to ask the server to wind down. Messages are bare JSON: no
//! envelope, no correlation.

use crate::config::AmsConfig;
use crate::connection::{ConnectionState, ReconnectingConnection};
use crate::error::{Error, Result};
use crate::timer::RepeatingTimer;
use crate::transport::SocketFactory;
use serde_json::{json, Value};
use std::time::Duration;

const HEARTBEAT_MESSAGE: &str = r#"{"heartbeat":{}}"#;

pub struct AmsClient {
    config: AmsConfig,
    connection: ReconnectingConnection,
    /// Registered by the first `send_ready`, removed on disconnect.
    heartbeat: Option<RepeatingTimer>,
    on_drain: Option<Box<dyn FnMut()>>,
}

impl AmsClient {
    pub fn new(config: AmsConfig, factory: impl SocketFactory + 'static) -> Self {
        let connection = ReconnectingConnection::new(config.connection.clone(), factory);
        Self {
            config,
            connection,
            heartbeat: None,
            on_drain: None,
        }
    }

    pub fn config(&self) -> &AmsConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// True once the heartbeat job has been started.
    pub fn is_heartbeat_running(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// Connect to the watchdog. Refused when no server id is configured.
    pub fn connect(&mut self) -> Result<()> {
        if self.config.ds_id.is_empty() {
            trace_warn!("cannot connect to AMS, DS id is empty");
            return Err(Error::invalid_config("ds_id is empty"));
        }
        trace_info!("connecting to {}", self.config.url);
        self.connection.connect();
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.heartbeat = None;
    }

    /// Report the server ready and start heartbeats if not already running.
    pub fn send_ready(&mut self) -> Result<()> {
        let message = json!({ "ready": { "dsid": self.config.ds_id } }).to_string();
        trace_info!("sending ready message to AMS: {}", message);
        self.connection.send(&message)?;

        if self.heartbeat.is_none() {
            self.heartbeat = Some(RepeatingTimer::new(self.config.heartbeat_interval()));
        }
        Ok(())
    }

    pub fn send_heartbeat(&mut self) -> Result<()> {
        self.connection.send(HEARTBEAT_MESSAGE)
    }

    pub fn tick(&mut self, delta: Duration) {
        for event in self.connection.poll() {
            if let Some(frame) = self.connection.handle_event(event) {
                self.on_message(&frame);
            }
        }
        self.connection.advance(delta);

        let due = self.heartbeat.as_mut().is_some_and(|t| t.advance(delta));
        if due {
            if let Err(e) = self.send_heartbeat() {
                trace_debug!("heartbeat skipped: {}", e);
            }
        }
    }

    pub fn on_drain<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.on_drain = Some(Box::new(handler));
    }

    pub fn on_connect_success<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.connection.on_connect_success(handler);
    }

    pub fn on_connect_error<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.connection.on_connect_error(handler);
    }

    pub fn on_connection_closed<F>(&mut self, handler: F)
    where
        F: FnMut(u16, &str, bool) + 'static,
    {
        self.connection.on_connection_closed(handler);
    }

    pub fn unbind_all(&mut self) {
        self.connection.unbind_handlers();
        self.on_drain = None;
    }

    fn on_message(&mut self, message: &str) {
        if message.is_empty() {
            return;
        }
        trace_debug!("AMS message: {}", message);

        let value: Value = match serde_json::from_str(message) {
            Ok(v) => v,
            Err(e) => {
                trace_warn!("failed to parse AMS message as a JSON object: {}", e);
                return;
            }
        };

        if value.get("drain").is_some_and(Value::is_object) {
            trace_info!("drain requested");
            if let Some(handler) = self.on_drain.as_mut() {
                handler();
            }
        }
    }
}
