mod relay_service;
mod ws_handler;

pub use relay_service::{MAX_PENDING_FRAMES, RelayService};
pub use ws_handler::{router, ws_handler};
