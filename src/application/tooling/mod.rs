mod connector;
mod descriptor;
mod error;
mod interface;
mod manager;
mod session;

pub use connector::HttpConnector;
pub use descriptor::{ToolDescriptor, render_result};
pub use error::{DiscoveryError, ToolError, ToolInvokeError};
pub use interface::{ServerToolInfo, SessionConnector, ToolServerInterface, ToolSession};
pub use manager::ServerManager;
pub use session::HttpMcpSession;
