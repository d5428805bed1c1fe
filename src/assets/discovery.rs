use super::{AssetTransport, TransportError};

#[derive(Debug, thiserror::Error)]
#[error("no reachable asset among {} candidate path(s): {}", .attempted.len(), .attempted.join(", "))]
pub struct AssetNotFound {
    /// Every candidate that was probed, in probe order.
    pub attempted: Vec<String>,
    /// Probe failure per attempted candidate, same order.
    pub failures: Vec<TransportError>,
}

/// Probes candidates strictly in list order and returns the first reachable
/// one. Earlier entries are preferred deployments, so probing never runs
/// ahead of the current candidate.
pub async fn find_reachable_path<T: AssetTransport>(
    transport: &T,
    candidates: &[String],
) -> Result<String, AssetNotFound> {
    let mut attempted = Vec::with_capacity(candidates.len());
    let mut failures = Vec::new();
    for candidate in candidates {
        if candidate.trim().is_empty() {
            continue;
        }
        attempted.push(candidate.clone());
        match transport.probe(candidate).await {
            Ok(()) => {
                log::info!("Asset found at {}", candidate);
                return Ok(candidate.clone());
            }
            Err(err) => {
                log::debug!("Probe failed: {}", err);
                failures.push(err);
            }
        }
    }
    log::error!("No candidate path reachable ({} tried)", attempted.len());
    Err(AssetNotFound {
        attempted,
        failures,
    })
}
