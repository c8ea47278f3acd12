//! Case-insensitive lookup of entity names.

use tracing::warn;

use crate::common::{GatewayError, GatewayResult};

/// Find the canonically-cased entity name matching `table_name`
///
/// Names are expected to be unique ignoring case; if several match, the
/// last one wins.
pub fn resolve_entity_name<S: AsRef<str>>(entity_names: &[S], table_name: &str) -> GatewayResult<String> {
    let wanted = table_name.to_lowercase();
    let matches: Vec<&str> = entity_names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| name.to_lowercase() == wanted)
        .collect();

    if matches.len() > 1 {
        warn!(table = table_name, candidates = ?matches, "Entity name matches more than one entity");
    }

    matches.last().map(|name| name.to_string()).ok_or_else(|| {
        GatewayError::bad_request(format!(
            "Bad request made, cannot find {} entity within the catalog",
            table_name
        ))
    })
}

/// Resolve an HTTP endpoint name such as `datasets` or `studies`
///
/// An exact case-insensitive match is tried first, then the singular form.
pub fn resolve_endpoint_name<S: AsRef<str>>(entity_names: &[S], endpoint: &str) -> GatewayResult<String> {
    resolve_entity_name(entity_names, endpoint).or_else(|err| {
        let singular = if let Some(stem) = endpoint.strip_suffix("ies") {
            format!("{}y", stem)
        } else if let Some(stem) = endpoint.strip_suffix('s') {
            stem.to_string()
        } else {
            return Err(err);
        };
        resolve_entity_name(entity_names, &singular).map_err(|_| err)
    })
}
