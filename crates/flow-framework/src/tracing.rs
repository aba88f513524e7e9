//! # Observability & Tracing
//!
//! Every unit and component logs through `tracing` with structured fields:
//!
//! - **Lifecycle**: `info!` when a component actor starts and stops, with its
//!   final counters.
//! - **Operations**: `debug!` per registration change or routing decision.
//! - **Peers**: `warn!` when a registered input has shut down.
//! - **Invariants**: `error!` right before an invariant violation panics.
//!
//! ```bash
//! RUST_LOG=info cargo run -p flow-sample
//! RUST_LOG=actor_flow=debug,flow_framework=debug cargo run -p flow-sample
//! ```

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`] but safe to call from many tests; later calls are ignored.
pub fn try_setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
