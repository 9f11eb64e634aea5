//! Client identity resolution for admission counting.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Where the client identity is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// Peer address of the TCP connection
    #[default]
    PeerAddress,
    /// `X-Forwarded-For` / `X-Real-IP` set by a trusted reverse proxy, then peer address
    ForwardedFor,
}

/// Resolves the network identity a request is counted against
#[derive(Debug, Clone, Default)]
pub struct KeyGenerator {
    strategy: KeyStrategy,
}

impl KeyGenerator {
    pub fn new(strategy: KeyStrategy) -> Self {
        Self { strategy }
    }

    pub fn trusting_proxy(trust_proxy_headers: bool) -> Self {
        if trust_proxy_headers {
            Self::new(KeyStrategy::ForwardedFor)
        } else {
            Self::new(KeyStrategy::PeerAddress)
        }
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    /// Client identity for a request, `"unknown"` when nothing identifies it
    pub fn client_identity(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let forwarded = match self.strategy {
            KeyStrategy::PeerAddress => None,
            KeyStrategy::ForwardedFor => Self::forwarded_ip(headers),
        };

        forwarded
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
        let from_forwarded_for = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        let from_real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        };

        from_forwarded_for.or_else(from_real_ip).map(str::to_string)
    }
}
