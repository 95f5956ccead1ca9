pub mod addr;
pub mod listener;
pub mod stream;

pub use addr::Address;
pub use listener::ListenerEndpoint;
pub use stream::StreamEndpoint;
