pub mod relay;

pub use relay::{MAX_PENDING_FRAMES, RelayService, router, ws_handler};

use tokio::net::TcpListener;
use tracing::info;

/// Serves the relay on `listener` until the server stops.
pub async fn serve(listener: TcpListener, service: RelayService) -> anyhow::Result<()> {
    info!("Relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}
