//! Network and listener identities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle of one logical network attachment (Wi-Fi, cellular, ...).
///
/// Interfaces that are not attached to any tracked network, such as
/// tethering downstream interfaces, are identified by `None` wherever an
/// `Option<Network>` is expected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Network(u64);

impl Network {
    pub fn new(net_id: u64) -> Self {
        Network(net_id)
    }

    pub fn net_id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Formats an optional network for logging, showing the null network as `null`.
pub(crate) struct DisplayNetwork<'a>(pub(crate) Option<&'a Network>);

impl fmt::Display for DisplayNetwork<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(network) => write!(f, "{network}"),
            None => write!(f, "null"),
        }
    }
}

/// Returns true if a request for `requested` covers an interface on `tracked`.
///
/// A request for the null network means "every network", including
/// interfaces that belong to no network.
pub fn is_network_matched(requested: Option<&Network>, tracked: Option<&Network>) -> bool {
    requested.is_none() || requested == tracked
}

/// Identity of a discovery listener.
///
/// Every call to [`ListenerId::new`] returns an id that compares unequal to
/// all ids minted before it, so two listeners are never confused even if
/// they were built from equal parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_listener_ids_are_unique() {
        let a = ListenerId::new();
        let b = ListenerId::new();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn test_null_request_matches_everything() {
        let wifi = Network::new(100);
        let cell = Network::new(101);

        assert!(is_network_matched(None, Some(&wifi)));
        assert!(is_network_matched(None, None));
        assert!(is_network_matched(Some(&wifi), Some(&wifi)));
        assert!(!is_network_matched(Some(&wifi), Some(&cell)));
        assert!(!is_network_matched(Some(&wifi), None));
    }

    #[test]
    fn test_display_network() {
        let wifi = Network::new(100);
        assert_eq!(DisplayNetwork(Some(&wifi)).to_string(), "100");
        assert_eq!(DisplayNetwork(None).to_string(), "null");
    }
}
