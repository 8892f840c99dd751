//! Model clients

mod base;
mod serving;

pub use base::HttpClientBase;
pub use serving::ServingEndpointClient;
