//! Process-wide default trust store.

use rustls::RootCertStore;
use std::sync::{Arc, OnceLock};

#[cfg(feature = "observability")]
use tracing::{debug, warn};

static DEFAULT_ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

/// Returns the platform's trust anchors, loading them on first use.
///
/// The store is built once and never modified afterwards, so it can be read
/// from any thread. If the platform store cannot be read the result is an
/// empty store and peer verification reports a failure.
pub fn default_roots() -> Arc<RootCertStore> {
    Arc::clone(DEFAULT_ROOTS.get_or_init(|| Arc::new(load_native_roots())))
}

fn load_native_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (_added, _ignored) = roots.add_parsable_certificates(certs);
            #[cfg(feature = "observability")]
            debug!(added = _added, ignored = _ignored, "Loaded default trust store");
        }
        Err(_error) => {
            #[cfg(feature = "observability")]
            warn!(error = %_error, "Failed to load system trust anchors");
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roots_is_shared() {
        let first = default_roots();
        let second = default_roots();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_initialization() {
        let handles: Vec<_> = (0..8).map(|_| std::thread::spawn(default_roots)).collect();
        let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for store in &stores[1..] {
            assert!(Arc::ptr_eq(&stores[0], store));
        }
    }
}
