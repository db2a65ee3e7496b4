//! Test support for chatwire.
//!
//! - [`fake_socket`]: in-memory transport the test drives from the server side
//! - [`fragment`]: random envelope fragmentation for reassembly tests

pub mod fake_socket;
pub mod fragment;

pub use fake_socket::{FakeServer, FakeSocket, FakeSocketFactory};
pub use fragment::Fragmenter;
