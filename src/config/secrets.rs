//! Secret handling re-exports, so callers building a [`Config`](super::Config)
//! by hand need no direct `secrecy` dependency.

pub use secrecy::{ExposeSecret, SecretString};
