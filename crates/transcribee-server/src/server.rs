//! Router assembly and the TCP accept loop.

use tokio::net::TcpListener;

use crate::middleware::{cors_layer, trace_layer};
use crate::state::AppState;

/// The coordinator's HTTP + WebSocket server.
pub struct Server {
    state: AppState,
    bind_addr: String,
}

impl Server {
    /// Bind a server to `state`'s configured address.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        let bind_addr = state.settings.bind_addr.clone();
        Self { state, bind_addr }
    }

    fn build_router(&self) -> axum::Router {
        crate::routes::router(self.state.clone())
            .layer(trace_layer())
            .layer(cors_layer())
    }

    /// Bind the configured address and serve until the process is
    /// killed.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the accept
    /// loop fails.
    pub async fn serve(self) -> anyhow::Result<()> {
        let app = self.build_router();
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "coordinator listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}
