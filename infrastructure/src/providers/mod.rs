//! Model provider adapters.
//!
//! Providers implement the [`ModelProvider`](concord_application::ModelProvider)
//! port and are registered by name in a
//! [`ProviderRegistry`](concord_application::ProviderRegistry).

mod echo;

pub use echo::{ECHO_PROVIDER_NAME, EchoProvider};
