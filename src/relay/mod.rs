//! Authenticated SOCKS5 relay for the paired phone
//!
//! Implements the server side of RFC 1928 with mandatory RFC 1929
//! username/password authentication. Only the CONNECT command is served
//! and only toward public destinations; loopback, link-local, private,
//! and multicast ranges are refused so the tunnel cannot be turned back
//! on the vehicle network.
//!
//! ```text
//! phone ----> greeting ----> [lockout check, method 0x02 only]
//!       ----> credentials -> [oap / derived password, 3 strikes]
//!       ----> CONNECT -----> [destination filter] ----> remote
//!       <======== bidirectional byte relay =========>
//! ```

mod auth;
mod command;
mod consts;
mod copy;
mod filter;
mod lockout;
mod server;

pub use auth::parse_auth_request;
pub use command::TargetAddr;
pub use consts::*;
pub use copy::relay_streams;
pub use filter::{is_blocked_address, is_blocked_ip};
pub use lockout::LockoutTable;
pub use server::Socks5Relay;
