pub mod client;
pub mod connectivity;

pub use client::{ReqwestTransport, ReqwestTransportBuilder};
pub use connectivity::HttpConnectivityProbe;
