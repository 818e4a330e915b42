mod conn_error;
mod connection;
mod cookie;
mod extension;
mod response;
mod sequence;
mod transport;

pub use conn_error::{ConnError, ProtocolError};
pub use connection::{Connection, ConnectionConfig, PollReply};
pub use cookie::Cookie;
pub use extension::ExtensionData;
pub use response::{MessageClass, MessageHeader, ResponseType};
pub use sequence::{SeqWidth, is_after, widen};
pub use transport::Transport;
