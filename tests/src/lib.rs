//! # Mesh Test Suite
//!
//! End-to-end scenarios across crates.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── fixtures.rs       # Layered stacks on a shared LocalNetwork
//! │   ├── requests.rs       # Request/response across services
//! │   ├── notifications.rs  # Fan-out and group delivery
//! │   ├── errors.rs         # Error chains, mapping, validation, timeouts
//! │   └── gateway.rs        # HTTP in, transport out
//! └── benches/
//!     └── broker_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mesh-tests
//! cargo test -p mesh-tests integration::notifications
//! cargo bench -p mesh-tests
//! ```

pub mod integration;
