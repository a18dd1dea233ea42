//! Per-chain payment-subgraph endpoint registry.
//!
//! The ledger collaborator detects payments by querying a block-indexing
//! subgraph; each chain has a hardcoded fallback URL that an environment
//! variable (`PAYMENTS_SUBGRAPH_URL_<CHAIN>`) can override. The table is
//! built once at startup so an unknown chain fails fast, not at first use.

use std::collections::BTreeMap;

use super::LedgerError;

/// Hardcoded fallback subgraph endpoint per supported chain.
const DEFAULT_SUBGRAPH_URLS: &[(&str, &str)] = &[
    (
        "arbitrum-one",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-arbitrum-one/api",
    ),
    (
        "avalanche",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-avalanche/api",
    ),
    (
        "base",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-base/api",
    ),
    (
        "bsc",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-bsc/api",
    ),
    (
        "celo",
        "https://api.studio.thegraph.com/query/67444/request-payments-celo/version/latest",
    ),
    (
        "core",
        "https://thegraph.coredao.org/subgraphs/name/requestnetwork/request-payments-core",
    ),
    (
        "fantom",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-fantom/api",
    ),
    (
        "fuse",
        "https://api.studio.thegraph.com/query/67444/request-payments-fuse/version/latest",
    ),
    (
        "mainnet",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-mainnet/api",
    ),
    (
        "matic",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-matic/api",
    ),
    (
        "moonbeam",
        "https://api.studio.thegraph.com/query/67444/request-payments-moonbeam/version/latest",
    ),
    (
        "optimism",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-optimism/api",
    ),
    (
        "sepolia",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-sepolia/api",
    ),
    (
        "xdai",
        "https://api.studio.thegraph.com/query/67444/request-payments-xdai/version/latest",
    ),
    (
        "zksyncera",
        "https://subgraph.satsuma-prod.com/e2e4905ab7c8/request-network--434873/request-payments-zksyncera/api",
    ),
];

/// Static chain-to-subgraph-URL mapping, resolved once at startup.
#[derive(Debug, Clone)]
pub struct SubgraphRegistry {
    urls: BTreeMap<String, String>,
}

impl SubgraphRegistry {
    /// Build the registry from the hardcoded fallbacks plus any per-chain
    /// environment overrides.
    pub fn from_env() -> Self {
        let urls = DEFAULT_SUBGRAPH_URLS
            .iter()
            .map(|(chain, fallback)| {
                let env_key = format!(
                    "PAYMENTS_SUBGRAPH_URL_{}",
                    chain.to_ascii_uppercase().replace('-', "_")
                );
                let url = std::env::var(&env_key).unwrap_or_else(|_| fallback.to_string());
                (chain.to_string(), url)
            })
            .collect();
        Self { urls }
    }

    /// Build a registry from explicit entries.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            urls: entries.into_iter().collect(),
        }
    }

    /// Subgraph endpoint for a chain.
    pub fn url_for(&self, chain: &str) -> Result<&str, LedgerError> {
        self.urls
            .get(chain)
            .map(String::as_str)
            .ok_or_else(|| LedgerError::UnknownChain(chain.to_string()))
    }

    /// All chains with a configured endpoint.
    pub fn chains(&self) -> impl Iterator<Item = &str> {
        self.urls.keys().map(String::as_str)
    }
}
