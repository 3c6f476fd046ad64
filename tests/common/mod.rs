//! Common test utilities.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // test body
//! }
//! ```
//!
//! With the crate's `tracing` feature enabled, stress runs can then be
//! replayed with full event output:
//!
//! ```bash
//! RUST_LOG=hashlinklist=trace cargo test --features tracing --test stress_tests
//! ```

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    });
}
