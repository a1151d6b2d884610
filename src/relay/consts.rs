//! SOCKS5 protocol constants and relay policy limits
//!
//! Wire constants follow RFC 1928 and RFC 1929. The policy limits at the
//! bottom are fixed properties of the relay, not configuration.

use std::time::Duration;

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS5 authentication sub-negotiation version
pub const SOCKS5_AUTH_VERSION: u8 = 0x01;

// Authentication methods
/// No authentication required (never accepted)
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// GSSAPI authentication (not implemented)
pub const SOCKS5_AUTH_METHOD_GSSAPI: u8 = 0x01;
/// Username/password authentication
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Authentication sub-negotiation status codes
/// Credentials accepted
pub const AUTH_SUCCESS: u8 = 0x00;
/// Credentials rejected
pub const AUTH_FAILURE: u8 = 0x01;

// Commands
/// TCP CONNECT command (the only supported command)
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command (not implemented)
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command (not implemented)
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reply codes
/// Succeeded
pub const SOCKS5_REPLY_SUCCEEDED: u8 = 0x00;
/// General SOCKS server failure
pub const SOCKS5_REPLY_GENERAL_FAILURE: u8 = 0x01;
/// Connection not allowed by ruleset
pub const SOCKS5_REPLY_CONNECTION_NOT_ALLOWED: u8 = 0x02;
/// Connection refused
pub const SOCKS5_REPLY_CONNECTION_REFUSED: u8 = 0x05;
/// Command not supported
pub const SOCKS5_REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

// Relay policy limits
/// Authentication failures from one address before it is locked out
pub const MAX_AUTH_FAILURES: u32 = 3;

/// How long a locked-out address stays locked after its last failure
pub const LOCKOUT_DURATION: Duration = Duration::from_secs(30);

/// Upper bound of an RFC 1929 credential message, read in one segment
pub const AUTH_REQUEST_MAX_LEN: usize = 513;

/// Grace period for the accept loop to stop before it is aborted
pub const ACCEPT_STOP_GRACE: Duration = Duration::from_secs(2);
