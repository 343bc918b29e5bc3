//! Tracing hook (feature: `tracing`).
//!
//! This module purposefully avoids pulling a subscriber; binaries install one.
//! Without the feature the hook compiles to nothing.

#[cfg(feature = "tracing")]
pub fn emit(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::span!(tracing::Level::TRACE, "relview", event);
    let _entered = span.enter();
    for (k, v) in key_values {
        tracing::trace!(%event, %k, %v, "relview event");
    }
}

#[cfg(not(feature = "tracing"))]
pub fn emit(_event: &str, _key_values: &[(&str, String)]) { /* no-op */
}
