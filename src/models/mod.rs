pub mod web_socket;

pub use web_socket::*;
