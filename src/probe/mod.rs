//! Probe implementations
//!
//! Concrete implementations of the engine's injected capabilities:
//! [`HttpProbe`] for HTTP step series and [`CertProbe`] (backed by a
//! [`StaplingResolver`]) for TLS certificate targets.

mod cert;
mod http;

pub use cert::{CertError, CertProbe, CertStatus, StaplingResolver, TlsResolver, TlsSession, VerifyMode};
pub use http::HttpProbe;
