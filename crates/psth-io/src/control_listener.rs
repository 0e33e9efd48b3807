// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Control-message listener over a ZMQ REP socket
//!
//! One dedicated thread receives control messages with a bounded poll, hands
//! each one to [`PsthEngine::handle_broadcast_message`], and acknowledges it.
//! The bounded poll lets [`ControlListener::stop`] observe the running flag
//! within one `poll_timeout_ms`.

use crate::error::{ListenerError, ListenerResult};
use parking_lot::Mutex;
use psth_engine::PsthEngine;
use psth_transports::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const THREAD_NAME: &str = "psth-control-listener";

/// Socket and loop settings for a [`ControlListener`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlListenerConfig {
    /// ZMQ endpoint to bind, e.g. `tcp://*:5557`
    pub endpoint: String,
    /// Upper bound on one blocking receive
    pub poll_timeout_ms: u64,
    pub recv_hwm: usize,
    pub send_hwm: usize,
    pub linger_ms: u64,
}

impl Default for ControlListenerConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://*:5557".to_string(),
            poll_timeout_ms: 100,
            recv_hwm: 1000,
            send_hwm: 1000,
            linger_ms: 0,
        }
    }
}

impl ControlListenerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_poll_timeout_ms(mut self, poll_timeout_ms: u64) -> Self {
        self.poll_timeout_ms = poll_timeout_ms;
        self
    }

    fn server_config(&self) -> ServerConfig {
        let mut base = TransportConfig::new(self.endpoint.clone())
            .with_recv_hwm(self.recv_hwm)
            .with_send_hwm(self.send_hwm);
        if self.linger_ms > 0 {
            base = base.with_linger(Duration::from_millis(self.linger_ms));
        }
        ServerConfig { base }
    }
}

/// Counters maintained by the listener thread
#[derive(Debug, Default)]
pub struct ListenerStats {
    requests: AtomicU64,
    lossy_decodes: AtomicU64,
    reply_failures: AtomicU64,
    receive_errors: AtomicU64,
}

impl ListenerStats {
    /// Requests received and applied to the engine
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Requests whose payload was not valid UTF-8
    pub fn lossy_decodes(&self) -> u64 {
        self.lossy_decodes.load(Ordering::Relaxed)
    }

    pub fn reply_failures(&self) -> u64 {
        self.reply_failures.load(Ordering::Relaxed)
    }

    pub fn receive_errors(&self) -> u64 {
        self.receive_errors.load(Ordering::Relaxed)
    }
}

/// Background listener feeding control messages into a shared engine
pub struct ControlListener {
    config: ControlListenerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ListenerStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ControlListener {
    /// Bind the socket and spawn the listener thread.
    ///
    /// A bind failure is returned to the caller; the engine is untouched and
    /// remains usable for in-process producers.
    pub fn start(config: ControlListenerConfig, engine: Arc<PsthEngine>) -> ListenerResult<Self> {
        if config.poll_timeout_ms == 0 {
            return Err(ListenerError::InvalidConfig(
                "poll_timeout_ms must be greater than 0".to_string(),
            ));
        }

        let mut server = ZmqRep::with_config(config.server_config())
            .map_err(|e| ListenerError::InvalidConfig(e.to_string()))?;
        server.start().map_err(|source| ListenerError::Bind {
            endpoint: config.endpoint.clone(),
            source,
        })?;

        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(ListenerStats::default());

        let worker = {
            let running = Arc::clone(&running);
            let stats = Arc::clone(&stats);
            let poll_timeout_ms = config.poll_timeout_ms;
            thread::Builder::new()
                .name(THREAD_NAME.to_string())
                .spawn(move || run_loop(server, engine, running, stats, poll_timeout_ms))?
        };

        info!("[CONTROL-LISTENER] Started on {}", config.endpoint);

        Ok(Self {
            config,
            running,
            stats,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn config(&self) -> &ControlListenerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.worker.lock().is_some()
    }

    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    /// Signal the thread to exit and join it. The socket is closed by the
    /// time this returns. Calling it again is a no-op.
    pub fn stop(&self) -> ListenerResult<()> {
        self.running.store(false, Ordering::Release);

        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };

        worker.join().map_err(|_| ListenerError::WorkerPanicked)?;
        info!("[CONTROL-LISTENER] Stopped ({})", self.config.endpoint);
        Ok(())
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("[CONTROL-LISTENER] Shutdown failed: {}", e);
        }
    }
}

impl std::fmt::Debug for ControlListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlListener")
            .field("endpoint", &self.config.endpoint)
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("requests", &self.stats.requests())
            .finish()
    }
}

fn run_loop(
    mut server: ZmqRep,
    engine: Arc<PsthEngine>,
    running: Arc<AtomicBool>,
    stats: Arc<ListenerStats>,
    poll_timeout_ms: u64,
) {
    debug!("[CONTROL-LISTENER] Processing loop started");

    while running.load(Ordering::Acquire) {
        match server.receive_timeout(poll_timeout_ms) {
            Ok((payload, reply_handle)) => {
                stats.requests.fetch_add(1, Ordering::Relaxed);
                let text = decode(&payload, &stats);
                debug!("[CONTROL-LISTENER] Received: {}", text);

                engine.handle_broadcast_message(&text);

                if let Err(e) = reply_handle.acknowledge() {
                    stats.reply_failures.fetch_add(1, Ordering::Relaxed);
                    warn!("[CONTROL-LISTENER] Failed to acknowledge: {}", e);
                }
            }
            Err(TransportError::Timeout) => continue,
            Err(TransportError::NotRunning) => break,
            Err(e) => {
                stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                error!("[CONTROL-LISTENER] Receive error: {}", e);
                thread::sleep(Duration::from_millis(poll_timeout_ms));
            }
        }
    }

    if let Err(e) = server.stop() {
        warn!("[CONTROL-LISTENER] Failed to close socket: {}", e);
    }
    debug!("[CONTROL-LISTENER] Processing loop stopped");
}

fn decode(payload: &[u8], stats: &ListenerStats) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(e) => {
            stats.lossy_decodes.fetch_add(1, Ordering::Relaxed);
            warn!(
                "[CONTROL-LISTENER] Payload is not valid UTF-8 ({}), decoding lossily",
                e
            );
            String::from_utf8_lossy(payload).into_owned()
        }
    }
}
