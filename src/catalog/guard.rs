//! Session validity checks around catalog operations.

use tracing::{info, warn};

use crate::common::{GatewayError, GatewayResult};

use super::client::CatalogClient;

/// Run `op` only if the client's session is still valid
///
/// A session that has expired, or a session failure raised by the client
/// while `op` runs, surfaces as `Authentication("Forbidden")`.
pub fn requires_session<T, F>(client: &dyn CatalogClient, op: F) -> GatewayResult<T>
where
    F: FnOnce() -> GatewayResult<T>,
{
    let remaining = client.remaining_minutes().map_err(|err| {
        warn!(error = %err, "Session check failed");
        GatewayError::forbidden()
    })?;
    info!(minutes = remaining, "Session time");
    if remaining < 0.0 {
        return Err(GatewayError::forbidden());
    }

    match op() {
        Err(GatewayError::Authentication(_)) => Err(GatewayError::forbidden()),
        other => other,
    }
}
