//! Network URL constants for the Pacifica SDK.

/// Default REST API base URL for Pacifica mainnet.
pub const DEFAULT_API_URL: &str = "https://api.pacifica.fi/api/v1";

/// Default WebSocket URL for Pacifica mainnet.
pub const DEFAULT_WS_URL: &str = "wss://ws.pacifica.fi/ws";
