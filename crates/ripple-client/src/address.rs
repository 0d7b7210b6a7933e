//! Endpoint address composition.

use url::Url;

use crate::errors::ClientError;

/// Compose the WebSocket URL of the endpoint at `path` on `base`.
///
/// The scheme becomes `ws`. Host and port of `base` are kept, and `path` is
/// appended to the base path as-is, except that a `path` with its own leading
/// `/` replaces the base path's trailing one. User info, query and fragment
/// are dropped.
pub fn server_endpoint_url(base: &str, path: &str) -> Result<Url, ClientError> {
    let base =
        Url::parse(base).map_err(|e| ClientError::Address(format!("{base:?}: {e}")))?;
    let host = base
        .host_str()
        .ok_or_else(|| ClientError::Address(format!("{base} has no host")))?;

    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };
    // `Url` renders an empty base path as "/".
    let base_path = if path.starts_with('/') {
        base.path().trim_end_matches('/')
    } else {
        base.path()
    };

    let target = format!("ws://{authority}{base_path}{path}");
    Url::parse(&target).map_err(|e| ClientError::Address(format!("{target:?}: {e}")))
}
