//! [`RouteTable`]: HTTP path → cache namespace, mutable at runtime.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::{debug, info};

use gridcache_core::normalize_route_path;

#[derive(Debug, Clone)]
struct Mount {
    owner: String,
    namespace: String,
}

/// A lookup request matched against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Mounted path that matched.
    pub path: String,
    /// Namespace to answer from.
    pub namespace: String,
    /// Facility code taken from the request.
    pub code: String,
}

/// Routing table shared by every mounted lookup path.
///
/// A path may briefly be held by two owners while a reconcile moves it from
/// a removed source to a new one. The most recent mount answers; the path is
/// unmounted only when its last owner leaves.
#[derive(Debug, Default)]
pub struct RouteTable {
    mounts: RwLock<BTreeMap<String, Vec<Mount>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `path` for `owner`, answering from `namespace`. Takes effect immediately.
    pub fn add(&self, path: &str, owner: &str, namespace: &str) {
        let path = normalize_route_path(path);
        let mut mounts = self.mounts.write().expect("route table lock poisoned");
        let owners = mounts.entry(path.clone()).or_default();
        owners.retain(|m| m.owner != owner);
        owners.push(Mount {
            owner: owner.to_string(),
            namespace: namespace.to_string(),
        });
        info!(path = %path, owner = %owner, namespace = %namespace, "route mounted");
    }

    /// Drop `owner`'s claim on `path`. Returns whether a claim was removed.
    pub fn remove(&self, path: &str, owner: &str) -> bool {
        let path = normalize_route_path(path);
        let mut mounts = self.mounts.write().expect("route table lock poisoned");
        let Some(owners) = mounts.get_mut(&path) else {
            return false;
        };
        let before = owners.len();
        owners.retain(|m| m.owner != owner);
        let removed = owners.len() != before;
        if owners.is_empty() {
            mounts.remove(&path);
            info!(path = %path, owner = %owner, "route unmounted");
        } else if removed {
            debug!(path = %path, owner = %owner, "route owner released, path still mounted");
        }
        removed
    }

    /// Namespace currently answering `path` exactly.
    pub fn namespace(&self, path: &str) -> Option<String> {
        let path = normalize_route_path(path);
        let mounts = self.mounts.read().expect("route table lock poisoned");
        mounts
            .get(&path)
            .and_then(|owners| owners.last())
            .map(|m| m.namespace.clone())
    }

    /// Match `<mounted path>/<code>`.
    pub fn resolve(&self, request_path: &str) -> Option<RouteMatch> {
        let trimmed = request_path.trim_end_matches('/');
        let (prefix, code) = trimmed.rsplit_once('/')?;
        if code.is_empty() {
            return None;
        }
        let path = normalize_route_path(prefix);
        let namespace = self.namespace(&path)?;
        Some(RouteMatch {
            path,
            namespace,
            code: code.to_string(),
        })
    }

    /// Match `<mounted path>` with the code supplied separately (e.g. `?code=`).
    pub fn resolve_with_code(&self, request_path: &str, code: &str) -> Option<RouteMatch> {
        if code.is_empty() {
            return None;
        }
        let path = normalize_route_path(request_path);
        let namespace = self.namespace(&path)?;
        Some(RouteMatch {
            path,
            namespace,
            code: code.to_string(),
        })
    }

    /// Mounted paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mounts = self.mounts.read().expect("route table lock poisoned");
        mounts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.mounts.read().expect("route table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.namespace(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mounted_path_resolves_code() {
        let table = RouteTable::new();
        table.add("sqlViews/abc/data.json", "http://a/api/sqlViews/abc/data.json", "/api/sqlViews/abc/data.json");

        let m = table.resolve("/sqlViews/abc/data.json/F001").unwrap();
        assert_eq!(m.path, "/sqlViews/abc/data.json");
        assert_eq!(m.namespace, "/api/sqlViews/abc/data.json");
        assert_eq!(m.code, "F001");
    }

    #[test]
    fn unknown_path_or_missing_code_does_not_resolve() {
        let table = RouteTable::new();
        table.add("/facilities", "u1", "/ns");
        assert!(table.resolve("/other/F001").is_none());
        assert!(table.resolve("/facilities").is_none());
        assert!(table.resolve("/facilities/").is_none());
        assert!(table.resolve_with_code("/facilities", "").is_none());
        assert_eq!(table.resolve_with_code("/facilities/", "F9").unwrap().code, "F9");
    }

    #[test]
    fn remove_only_drops_the_owners_claim() {
        let table = RouteTable::new();
        table.add("/facilities", "old", "/ns-old");
        table.add("/facilities", "new", "/ns-new");
        assert_eq!(table.namespace("/facilities").as_deref(), Some("/ns-new"));

        assert!(table.remove("/facilities", "old"));
        assert_eq!(table.namespace("/facilities").as_deref(), Some("/ns-new"));

        assert!(!table.remove("/facilities", "stranger"));
        assert!(table.remove("/facilities", "new"));
        assert!(table.is_empty());
    }

    #[test]
    fn remove_of_unmounted_path_is_noop() {
        let table = RouteTable::new();
        assert!(!table.remove("/nothing", "u1"));
    }

    #[test]
    fn re_adding_same_owner_updates_namespace() {
        let table = RouteTable::new();
        table.add("/f", "u1", "/a");
        table.add("/f", "u1", "/b");
        assert_eq!(table.namespace("/f").as_deref(), Some("/b"));
        assert!(table.remove("/f", "u1"));
        assert!(!table.contains("/f"));
    }

    #[test]
    fn root_mount_resolves_single_segment() {
        let table = RouteTable::new();
        table.add("/", "u1", "/ns");
        assert_eq!(table.resolve("/F1").unwrap().namespace, "/ns");
        assert_eq!(table.paths(), vec!["/"]);
    }
}
