//! Per-service IP allow-list.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::RwLock;

/// Sentinel granting access to any source address.
pub const WILDCARD: &str = "ALL";

/// A set of source-IP literals permitted to reach a service.
///
/// Membership of [`WILDCARD`] short-circuits all checks. The set is replaced
/// atomically on update; readers never observe a partial list.
#[derive(Debug, Default)]
pub struct AllowList {
    entries: RwLock<HashSet<String>>,
}

impl AllowList {
    /// Build an allow-list from configured literals.
    ///
    /// When the first element is the wildcard, the list collapses to just
    /// the wildcard; otherwise every non-wildcard element is inserted.
    pub fn from_entries(list: &[String]) -> Self {
        let mut entries = HashSet::new();
        if list.first().map(String::as_str) == Some(WILDCARD) {
            entries.insert(WILDCARD.to_string());
        } else {
            for ip in list {
                if ip != WILDCARD {
                    entries.insert(ip.clone());
                }
            }
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Whether the source address may access the service.
    pub fn allowed(&self, ip: IpAddr) -> bool {
        let entries = self.entries.read().expect("allow list lock poisoned");
        if entries.contains(WILDCARD) {
            return true;
        }
        entries.contains(&ip.to_string())
    }

    /// Replace the whole set atomically.
    pub fn replace(&self, list: &[String]) {
        let new = Self::from_entries(list);
        let new_entries = new.entries.into_inner().expect("allow list lock poisoned");
        let mut entries = self.entries.write().expect("allow list lock poisoned");
        *entries = new_entries;
    }

    /// Current entries, for registry snapshots.
    pub fn entries(&self) -> Vec<String> {
        let entries = self.entries.read().expect("allow list lock poisoned");
        let mut list: Vec<String> = entries.iter().cloned().collect();
        list.sort();
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_exact_match() {
        let list = AllowList::from_entries(&["10.0.0.1".into(), "10.0.0.2".into()]);
        assert!(list.allowed(ip("10.0.0.1")));
        assert!(list.allowed(ip("10.0.0.2")));
        assert!(!list.allowed(ip("10.0.0.3")));
    }

    #[test]
    fn test_wildcard_first_collapses() {
        let list = AllowList::from_entries(&["ALL".into(), "10.0.0.1".into()]);
        assert_eq!(list.entries(), vec!["ALL".to_string()]);
        assert!(list.allowed(ip("192.168.1.44")));
    }

    #[test]
    fn test_wildcard_elsewhere_ignored() {
        let list = AllowList::from_entries(&["10.0.0.1".into(), "ALL".into()]);
        assert_eq!(list.entries(), vec!["10.0.0.1".to_string()]);
        assert!(list.allowed(ip("10.0.0.1")));
        assert!(!list.allowed(ip("192.168.1.44")));
    }

    #[test]
    fn test_empty_denies() {
        let list = AllowList::from_entries(&[]);
        assert!(!list.allowed(ip("127.0.0.1")));
    }

    #[test]
    fn test_replace_is_total() {
        let list = AllowList::from_entries(&["10.0.0.1".into()]);
        list.replace(&["10.0.0.9".into()]);
        assert!(!list.allowed(ip("10.0.0.1")));
        assert!(list.allowed(ip("10.0.0.9")));
    }
}
