//! Request execution: transport ports, connectivity and the pipeline

pub mod connectivity;
pub mod pipeline;
pub mod ports;

pub use connectivity::ToggleConnectivity;
pub use pipeline::{PipelineSettings, RequestPipeline};
pub use ports::{ConnectivityProbe, Transport};
