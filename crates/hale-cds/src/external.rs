//! External CDS service proxying
//!
//! An external endpoint's discovery document is fetched and each listed
//! service is wrapped as a local proxy handler that forwards invocation
//! requests as JSON.

use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::engine::CdsEngine;
use crate::error::{CdsError, Result};
use crate::types::{CdsResponse, DiscoveryResponse};

/// Timeout for discovery fetches and proxied invocations
pub const EXTERNAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch `{base}/cds-services` and register a proxy for every listed
/// service
///
/// Returns the number of services registered. The proxies post the
/// invocation request to `{base}/cds-services/{id}` and decode the JSON
/// response.
pub async fn register_external_services(engine: &CdsEngine, base_url: &str) -> Result<usize> {
    let base_url = base_url.trim_end_matches('/').to_string();
    let client = Client::builder().timeout(EXTERNAL_TIMEOUT).build()?;

    let discovery: DiscoveryResponse = client
        .get(format!("{}/cds-services", base_url))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let count = discovery.services.len();
    for descriptor in discovery.services {
        let url = format!("{}/cds-services/{}", base_url, descriptor.id);
        let client = client.clone();
        info!(service = %descriptor.id, %url, "registering external CDS service");

        engine.register(descriptor, move |request| {
            let client = client.clone();
            let url = url.clone();
            async move {
                let response: CdsResponse = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                Ok(response)
            }
        });
    }

    Ok(count)
}
