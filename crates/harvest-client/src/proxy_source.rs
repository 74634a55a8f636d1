//! Proxy listing client.
//!
//! Queries a ProxyScrape-style endpoint once per run. The simplified
//! format is one `host:port` per line; malformed lines are dropped with
//! a warning rather than failing the whole list.

use std::time::Duration;

use harvest_core::error::HarvestError;
use harvest_core::proxy::ProxyEndpoint;
use harvest_core::traits::{ProxyProbe, ProxySource};
use reqwest::Client;

const DEFAULT_API_URL: &str = "https://api.proxyscrape.com/v2/";
const DEFAULT_PROBE_URL: &str = "http://httpbin.org/ip";
const PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct ProxyScrapeSource {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl ProxyScrapeSource {
    pub fn new(api_key: Option<String>) -> Result<Self, HarvestError> {
        Self::with_api_url(DEFAULT_API_URL, api_key)
    }

    pub fn with_api_url(api_url: &str, api_key: Option<String>) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .user_agent("harvest/0.2")
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| HarvestError::ProxySourceUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key,
        })
    }
}

impl ProxySource for ProxyScrapeSource {
    async fn fetch_candidates(&self) -> Result<Vec<ProxyEndpoint>, HarvestError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("request", "getproxies"),
            ("protocol", "http"),
            ("timeout", "10000"),
            ("country", "all"),
            ("ssl", "all"),
            ("anonymity", "all"),
            ("simplified", "true"),
        ];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key));
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| HarvestError::ProxySourceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::ProxySourceUnavailable(format!(
                "listing service returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::ProxySourceUnavailable(e.to_string()))?;

        let candidates = parse_proxy_list(&body);
        if candidates.is_empty() {
            return Err(HarvestError::ProxySourceUnavailable(
                "listing service returned no usable candidates".to_string(),
            ));
        }

        tracing::info!(candidates = candidates.len(), "Fetched proxy candidates");
        Ok(candidates)
    }
}

/// Health check for newly activated endpoints: one cheap HTTP request
/// through the proxy before any real page is fetched through it. Dead
/// endpoints report false and never carry a fetch.
#[derive(Clone)]
pub struct HttpProxyProbe {
    probe_url: String,
    timeout: Duration,
}

impl HttpProxyProbe {
    pub fn new() -> Self {
        Self::with_probe_url(DEFAULT_PROBE_URL)
    }

    pub fn with_probe_url(probe_url: &str) -> Self {
        Self {
            probe_url: probe_url.to_string(),
            timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }
}

impl Default for HttpProxyProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyProbe for HttpProxyProbe {
    async fn check(&self, proxy: &ProxyEndpoint) -> bool {
        let mut builder = match reqwest::Proxy::all(format!("http://{}", proxy.authority())) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(%proxy, error = %e, "Rejecting unparseable proxy endpoint");
                return false;
            }
        };
        if let Some((user, pass)) = &proxy.credentials {
            builder = builder.basic_auth(user, pass);
        }

        // Per-check client: the proxy setting is baked into the client.
        let client = match Client::builder()
            .proxy(builder)
            .timeout(self.timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(%proxy, error = %e, "Failed to build probe client");
                return false;
            }
        };

        match client.get(&self.probe_url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(%proxy, status = %response.status(), "Probe request rejected");
                false
            }
            Err(e) => {
                tracing::warn!(%proxy, error = %e, "Probe request failed");
                false
            }
        }
    }
}

/// Parse line-per-proxy `host:port` text.
fn parse_proxy_list(body: &str) -> Vec<ProxyEndpoint> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
                Ok(port) => Some(ProxyEndpoint::new(host, port)),
                Err(_) => {
                    tracing::warn!(%line, "Dropping proxy line with bad port");
                    None
                }
            },
            _ => {
                tracing::warn!(%line, "Dropping malformed proxy line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simplified_list() {
        let body = "1.2.3.4:8080\n5.6.7.8:3128\n";
        let list = parse_proxy_list(body);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].authority(), "1.2.3.4:8080");
        assert_eq!(list[1].authority(), "5.6.7.8:3128");
    }

    #[test]
    fn test_parse_preserves_listing_order() {
        let body = "9.9.9.9:1\n8.8.8.8:2\n7.7.7.7:3";
        let list = parse_proxy_list(body);
        let hosts: Vec<&str> = list.iter().map(|p| p.address.as_str()).collect();
        assert_eq!(hosts, ["9.9.9.9", "8.8.8.8", "7.7.7.7"]);
    }

    #[test]
    fn test_parse_drops_malformed_lines() {
        let body = "1.2.3.4:8080\nnot-a-proxy\n5.6.7.8:notaport\n:8080\n\n  \n";
        let list = parse_proxy_list(body);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_parse_empty_body_gives_no_candidates() {
        assert!(parse_proxy_list("").is_empty());
        assert!(parse_proxy_list("\n\n").is_empty());
    }
}
