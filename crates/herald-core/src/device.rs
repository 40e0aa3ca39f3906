//! Device-side vocabulary: platform, gateway environment, push token.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Accepted token shape after normalization. APNs issues 32-byte tokens
/// (64 hex chars); longer tokens are tolerated.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{64,256}$").unwrap_or_else(|e| panic!("token regex: {e}"))
});

/// Push channel a registration belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// iOS app installation addressed through APNs.
    Ios,
}

impl Platform {
    /// Every platform the dispatcher fans out to.
    pub const ALL: [Platform; 1] = [Platform::Ios];

    /// Storage / wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "ios",
        }
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" | "mobile-ios" | "apns" => Ok(Self::Ios),
            _ => Err(ValidationError::InvalidPlatform(s.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push gateway delivery network. A token is valid in exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development builds (`api.sandbox.push.apple.com`).
    Sandbox,
    /// App Store / TestFlight builds (`api.push.apple.com`).
    Production,
}

impl Environment {
    /// Storage / wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    /// Map a free-text value written by older schema versions onto the
    /// closed enum. Production-looking values map to production; anything
    /// else (including missing values) maps to sandbox.
    #[must_use]
    pub fn from_legacy(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Sandbox;
        };
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.starts_with("prod") || lowered == "release" || lowered == "live" {
            Self::Production
        } else {
            Self::Sandbox
        }
    }
}

impl FromStr for Environment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "development" | "dev" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ValidationError::InvalidEnvironment(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized device push token (lowercase hex).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PushToken(String);

impl PushToken {
    /// Normalize and validate a raw token.
    ///
    /// Clients send tokens in several decorated forms (the `NSData`
    /// description `<abcd ef01 ...>`, dash- or colon-grouped hex), so every
    /// non-hex character is stripped before the length check.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized: String = raw
            .chars()
            .filter(char::is_ascii_hexdigit)
            .collect::<String>()
            .to_ascii_lowercase();
        if TOKEN_RE.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(ValidationError::InvalidToken(format!(
                "expected 64-256 hex characters, got {} characters",
                normalized.len()
            )))
        }
    }

    /// Return the token as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for logs.
    #[must_use]
    pub fn prefix(&self) -> &str {
        crate::logging::redact_token(&self.0)
    }
}

impl fmt::Debug for PushToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PushToken({}…)", self.prefix())
    }
}

impl FromStr for PushToken {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PushToken {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PushToken> for String {
    fn from(token: PushToken) -> Self {
        token.0
    }
}

/// Infer the gateway environment from where a registration request came from.
///
/// `origin` may be an `Origin` header (`http://host:port`), a `Host` header
/// (`host:port`), or a bare IP address. Loopback, private, link-local, and
/// unique-local addresses plus `localhost` and `*.local` hosts are development
/// setups and map to [`Environment::Sandbox`]. Everything else, including a
/// missing origin, maps to [`Environment::Production`].
#[must_use]
pub fn infer_environment(origin: Option<&str>) -> Environment {
    let Some(host) = origin.and_then(extract_host) else {
        return Environment::Production;
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return if is_local_ip(ip) {
            Environment::Sandbox
        } else {
            Environment::Production
        };
    }

    let host = host.to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local") {
        Environment::Sandbox
    } else {
        Environment::Production
    }
}

fn extract_host(origin: &str) -> Option<&str> {
    let origin = origin.trim();
    let without_scheme = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let authority = without_scheme.split('/').next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, h)| h);

    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split_once(']').map(|(ip, _)| ip);
    }
    // A bare IPv6 address has several colons and no port.
    if authority.matches(':').count() > 1 {
        return Some(authority);
    }
    let host = authority.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback() || v4.is_private())
        }
    }
}
