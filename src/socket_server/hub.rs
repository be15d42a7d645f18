//! Broadcast hub: websocket accept loop
//!
//! # Usage
//!
//! ```no_run
//! # async fn demo(state: std::sync::Arc<uiver::server::EngineState>) -> uiver::Result<()> {
//! let hub = uiver::socket_server::Hub::bind(state).await?;
//! println!("listening on ws://{}", hub.local_addr());
//! hub.run().await;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::{EngineError, Result};
use crate::processor::CommandProcessor;
use crate::server::EngineState;

use super::connection::handle_connection;

/// Bound websocket listener for one engine
pub struct Hub {
    listener: TcpListener,
    local_addr: SocketAddr,
    processor: CommandProcessor,
}

impl Hub {
    /// Bind the configured host and port (port 0 picks a free one)
    pub async fn bind(state: Arc<EngineState>) -> Result<Self> {
        let addr = state.config().bind_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| EngineError::Config {
            message: format!("cannot listen on {}: {}", addr, e),
        })?;
        let local_addr = listener.local_addr()?;
        tracing::info!("[HUB] Listening on ws://{}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            processor: CommandProcessor::new(state),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!("[HUB] Accepted connection from {}", addr);
                    let processor = self.processor.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, processor).await;
                    });
                }
                Err(e) => {
                    tracing::error!("[HUB] Failed to accept connection: {}", e);
                }
            }
        }
    }
}
