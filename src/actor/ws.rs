//! WebSocket Actor
//!
//! Receives handshaken clients from the accept thread and gives each one a
//! notification channel. The client's reader thread closes the channel when
//! the peer goes away.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::messages::WsMsg;
use crate::reload::Orchestrator;

pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    orchestrator: Arc<Orchestrator>,
}

impl WsActor {
    pub fn new(rx: mpsc::Receiver<WsMsg>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { rx, orchestrator }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                WsMsg::AddClient(conn) => {
                    let channel = self.orchestrator.connect(conn.clone());
                    conn.spawn_reader(move || channel.close());
                }
                WsMsg::Shutdown => break,
            }
        }
        self.orchestrator.close_all();
        crate::debug!("ws"; "stopped");
    }
}
