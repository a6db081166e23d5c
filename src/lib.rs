//! Recibos Library
//!
//! On-device receipt scanning: model acquisition, guarded vision-language
//! inference and the image bounding that keeps both inside device memory.

pub mod app;
pub mod imaging;
pub mod inference;
pub mod state;
pub mod storage;
pub mod types;

pub use app::ReceiptScanner;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recibos=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
