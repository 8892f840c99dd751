//! Model infrastructure module
//!
//! # Structure
//! - `types` - Request, Response, Stream and Error types
//! - `traits` - ModelProvider trait
//! - `adapter` - Message format adapter
//! - `clients` - Serving endpoint client

pub mod adapter;
pub mod clients;
pub mod traits;
pub mod types;

pub use clients::ServingEndpointClient;
pub use traits::ModelProvider;
pub use types::{ModelDelta, ModelError, ModelRequest, ModelResponse, ModelStream};
