//! URI-based link parser covering the common proxy share-link formats.
//!
//! Supported forms:
//!
//! - `scheme://[userinfo@]host:port[/path][?query][#name]` for `ss`, `vless`,
//!   `trojan`, `trojan-go`, `hysteria2`/`hy2`, `tuic`, `juicity`, `socks4`,
//!   `socks5`, `http` and `https`
//! - legacy `ss://base64(method:password@host:port)#name`
//! - `vmess://base64(json)` with `ps`, `add` and `port` fields
//! - `ssr://base64(host:port:protocol:method:obfs:password/?remarks=...)`

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use url::Url;

use crate::inventory::{
    domain::{InventoryDomainError, NodeAttributes},
    ports::LinkParser,
};

const SUPPORTED_SCHEMES: &[&str] = &[
    "ss",
    "ssr",
    "vmess",
    "vless",
    "trojan",
    "trojan-go",
    "hysteria2",
    "hy2",
    "tuic",
    "juicity",
    "socks4",
    "socks5",
    "http",
    "https",
];

/// Default [`LinkParser`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriLinkParser;

impl UriLinkParser {
    /// Creates the parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LinkParser for UriLinkParser {
    fn parse(&self, link: &str) -> Result<NodeAttributes, InventoryDomainError> {
        let trimmed = link.trim();
        let (raw_scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| InventoryDomainError::invalid_link("missing scheme separator"))?;
        let scheme = raw_scheme.to_ascii_lowercase();
        if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
            return Err(InventoryDomainError::invalid_link(format!(
                "unsupported protocol '{raw_scheme}'"
            )));
        }
        if rest.is_empty() {
            return Err(InventoryDomainError::invalid_link("empty link body"));
        }

        let endpoint = match scheme.as_str() {
            "vmess" => parse_vmess(rest).or_else(|_| parse_uri(&scheme, trimmed))?,
            "ssr" => parse_ssr(rest)?,
            "ss" => parse_uri(&scheme, trimmed).or_else(|_| parse_legacy_ss(rest))?,
            _ => parse_uri(&scheme, trimmed)?,
        };

        let address = format!("{}:{}", endpoint.host, endpoint.port);
        let name = endpoint
            .name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| address.clone());

        Ok(NodeAttributes {
            link: trimmed.to_owned(),
            name,
            address,
            protocol: scheme,
        })
    }
}

struct Endpoint {
    host: String,
    port: u16,
    name: Option<String>,
}

fn parse_uri(scheme: &str, link: &str) -> Result<Endpoint, InventoryDomainError> {
    let url = Url::parse(link).map_err(|err| InventoryDomainError::invalid_link(err.to_string()))?;
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| InventoryDomainError::invalid_link("missing host"))?;
    let port = url
        .port()
        .or_else(|| default_port(scheme))
        .ok_or_else(|| InventoryDomainError::invalid_link("missing port"))?;
    let name = url.fragment().map(decode_component);
    Ok(Endpoint {
        host: host.to_owned(),
        port,
        name,
    })
}

fn parse_legacy_ss(rest: &str) -> Result<Endpoint, InventoryDomainError> {
    let (encoded, fragment) = match rest.split_once('#') {
        Some((encoded, fragment)) => (encoded, Some(fragment)),
        None => (rest, None),
    };
    let decoded = decode_base64_text(encoded)?;
    let (_, server) = decoded
        .rsplit_once('@')
        .ok_or_else(|| InventoryDomainError::invalid_link("legacy ss link lacks '@'"))?;
    let (host, port) = split_host_port(server)?;
    Ok(Endpoint {
        host,
        port,
        name: fragment.map(decode_component),
    })
}

#[derive(Deserialize)]
struct VmessPayload {
    #[serde(default)]
    ps: Option<String>,
    add: String,
    port: serde_json::Value,
}

fn parse_vmess(rest: &str) -> Result<Endpoint, InventoryDomainError> {
    let json = decode_base64_text(rest)?;
    let payload: VmessPayload = serde_json::from_str(&json)
        .map_err(|err| InventoryDomainError::invalid_link(format!("vmess payload: {err}")))?;
    let port = match &payload.port {
        serde_json::Value::Number(number) => number
            .as_u64()
            .and_then(|value| u16::try_from(value).ok()),
        serde_json::Value::String(text) => text.trim().parse::<u16>().ok(),
        _ => None,
    }
    .ok_or_else(|| InventoryDomainError::invalid_link("vmess payload has no valid port"))?;
    if payload.add.trim().is_empty() {
        return Err(InventoryDomainError::invalid_link("vmess payload has no address"));
    }
    Ok(Endpoint {
        host: payload.add.trim().to_owned(),
        port,
        name: payload.ps,
    })
}

fn parse_ssr(rest: &str) -> Result<Endpoint, InventoryDomainError> {
    let decoded = decode_base64_text(rest)?;
    let (main, query) = match decoded.split_once("/?") {
        Some((main, query)) => (main, Some(query)),
        None => (decoded.as_str(), None),
    };
    let mut fields = main.splitn(3, ':');
    let host = fields.next().unwrap_or_default().trim();
    let port = fields
        .next()
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .ok_or_else(|| InventoryDomainError::invalid_link("ssr link has no valid port"))?;
    if host.is_empty() {
        return Err(InventoryDomainError::invalid_link("ssr link has no host"));
    }
    let name = query.and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "remarks")
            .and_then(|(_, value)| decode_base64_text(&value).ok())
    });
    Ok(Endpoint {
        host: host.to_owned(),
        port,
        name,
    })
}

fn split_host_port(server: &str) -> Result<(String, u16), InventoryDomainError> {
    let (host, port) = server
        .rsplit_once(':')
        .ok_or_else(|| InventoryDomainError::invalid_link("missing port"))?;
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|_| InventoryDomainError::invalid_link("invalid port"))?;
    if host.is_empty() {
        return Err(InventoryDomainError::invalid_link("missing host"));
    }
    Ok((host.to_owned(), port))
}

fn decode_base64_text(encoded: &str) -> Result<String, InventoryDomainError> {
    let normalized = encoded.trim().trim_end_matches('=');
    let bytes = STANDARD_NO_PAD
        .decode(normalized)
        .or_else(|_| URL_SAFE_NO_PAD.decode(normalized))
        .map_err(|_| InventoryDomainError::invalid_link("payload is not base64"))?;
    String::from_utf8(bytes).map_err(|_| InventoryDomainError::invalid_link("payload is not text"))
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

const fn default_port(scheme: &str) -> Option<u16> {
    match scheme.as_bytes() {
        b"http" => Some(80),
        b"https" => Some(443),
        b"socks4" | b"socks5" => Some(1080),
        _ => None,
    }
}
