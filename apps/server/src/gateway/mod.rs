pub mod events;
pub mod fanout;
pub mod presence;
pub mod relay;
pub mod server;
pub mod session;
