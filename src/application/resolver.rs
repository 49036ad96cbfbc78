use crate::domain::bill::UserId;
use crate::domain::ports::VendorStoreRef;
use crate::domain::vendor::{Vendor, VendorId, normalize_name};
use crate::error::Result;
use crate::policy::EnginePolicy;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A resolver verdict: the vendor to attach plus whether it was created on
/// this sighting.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub vendor: Vendor,
    pub created: bool,
}

/// Matches extracted vendor candidates against a user's known vendors.
///
/// Matching order: exact email, then name similarity (equality beats
/// containment beats Jaro-Winkler), then most-recently-used as tie-break.
/// Unmatched candidates become new vendors in pending status. The cache is
/// owned by this instance and injected nowhere else, so dropping the
/// resolver drops all resolution state.
pub struct VendorResolver {
    vendors: VendorStoreRef,
    policy: Arc<EnginePolicy>,
    cache: RwLock<HashMap<(UserId, String), VendorId>>,
}

/// Similarity for normalized names; exact and containment matches outrank
/// any fuzzy score.
fn name_score(candidate: &str, target: &str) -> f64 {
    if candidate == target {
        1.0
    } else if candidate.contains(target) || target.contains(candidate) {
        0.92
    } else {
        strsim::jaro_winkler(candidate, target)
    }
}

impl VendorResolver {
    pub fn new(vendors: VendorStoreRef, policy: Arc<EnginePolicy>) -> Self {
        Self {
            vendors,
            policy,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a candidate to an existing vendor or creates one. Every
    /// sighting, matched or created, refreshes the vendor's `last_seen_at`.
    pub async fn resolve(
        &self,
        user_id: &str,
        name: &str,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Resolution> {
        let normalized = normalize_name(name);
        let cache_key = (user_id.to_string(), normalized.clone());

        if let Some(id) = self.cache.read().await.get(&cache_key).copied()
            && let Some(mut vendor) = self.vendors.get(id).await?
            && vendor.normalized_name == normalized
        {
            vendor.touch(now);
            self.vendors.update(vendor.clone()).await?;
            return Ok(Resolution {
                vendor,
                created: false,
            });
        }

        let candidates = self.vendors.list_by_user(user_id).await?;

        let matched = Self::match_by_email(&candidates, email)
            .or_else(|| self.match_by_name(&candidates, &normalized));

        if let Some(mut vendor) = matched {
            vendor.touch(now);
            self.vendors.update(vendor.clone()).await?;
            self.cache.write().await.insert(cache_key, vendor.id);
            return Ok(Resolution {
                vendor,
                created: false,
            });
        }

        let mut vendor = Vendor::new(user_id, name, now)?;
        vendor.email = email.map(str::to_string);
        self.vendors.insert(vendor.clone()).await?;
        self.cache.write().await.insert(cache_key, vendor.id);
        Ok(Resolution {
            vendor,
            created: true,
        })
    }

    fn match_by_email(candidates: &[Vendor], email: Option<&str>) -> Option<Vendor> {
        let email = email?.trim().to_lowercase();
        if email.is_empty() {
            return None;
        }
        candidates
            .iter()
            .filter(|v| {
                v.email
                    .as_deref()
                    .is_some_and(|e| e.trim().to_lowercase() == email)
            })
            .max_by_key(|v| v.last_seen_at)
            .cloned()
    }

    fn match_by_name(&self, candidates: &[Vendor], normalized: &str) -> Option<Vendor> {
        candidates
            .iter()
            .map(|v| (name_score(&v.normalized_name, normalized), v))
            .filter(|(score, _)| *score >= self.policy.name_match_threshold)
            .max_by(|(a, va), (b, vb)| {
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| va.last_seen_at.cmp(&vb.last_seen_at))
            })
            .map(|(_, v)| v.clone())
    }

    /// Drops every cached name→vendor association.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryVendorStore;
    use chrono::TimeDelta;

    fn resolver() -> (VendorResolver, VendorStoreRef) {
        let store: VendorStoreRef = Arc::new(InMemoryVendorStore::new());
        let resolver = VendorResolver::new(store.clone(), Arc::new(EnginePolicy::default()));
        (resolver, store)
    }

    #[tokio::test]
    async fn test_unknown_vendor_is_created_pending() {
        let (resolver, _) = resolver();
        let resolution = resolver
            .resolve("user-1", "Acme Corp", Some("billing@acme.test"), Utc::now())
            .await
            .unwrap();
        assert!(resolution.created);
        assert_eq!(resolution.vendor.name, "Acme Corp");
        assert_eq!(resolution.vendor.email.as_deref(), Some("billing@acme.test"));
        assert_eq!(
            resolution.vendor.status,
            crate::domain::vendor::VendorStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_exact_name_match_reuses_vendor() {
        let (resolver, _) = resolver();
        let now = Utc::now();
        let first = resolver
            .resolve("user-1", "Acme Corp", None, now)
            .await
            .unwrap();
        let second = resolver
            .resolve("user-1", "ACME   corp", None, now)
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.vendor.id, first.vendor.id);
    }

    #[tokio::test]
    async fn test_fuzzy_match_tolerates_minor_variation() {
        let (resolver, _) = resolver();
        let now = Utc::now();
        let first = resolver
            .resolve("user-1", "Initech Solutions", None, now)
            .await
            .unwrap();
        let second = resolver
            .resolve("user-1", "Initech Solutionz", None, now)
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.vendor.id, first.vendor.id);
    }

    #[tokio::test]
    async fn test_dissimilar_names_create_distinct_vendors() {
        let (resolver, _) = resolver();
        let now = Utc::now();
        let first = resolver
            .resolve("user-1", "Acme Corp", None, now)
            .await
            .unwrap();
        let second = resolver
            .resolve("user-1", "Globex Industries", None, now)
            .await
            .unwrap();
        assert!(second.created);
        assert_ne!(second.vendor.id, first.vendor.id);
    }

    #[tokio::test]
    async fn test_email_match_beats_name_mismatch() {
        let (resolver, store) = resolver();
        let now = Utc::now();
        let mut vendor = Vendor::new("user-1", "Acme Corporation Ltd", now).unwrap();
        vendor.email = Some("Billing@Acme.test".to_string());
        store.insert(vendor.clone()).await.unwrap();

        let resolution = resolver
            .resolve("user-1", "Completely Different", Some("billing@acme.test"), now)
            .await
            .unwrap();
        assert!(!resolution.created);
        assert_eq!(resolution.vendor.id, vendor.id);
    }

    #[tokio::test]
    async fn test_vendors_are_scoped_per_user() {
        let (resolver, _) = resolver();
        let now = Utc::now();
        let first = resolver
            .resolve("user-1", "Acme Corp", None, now)
            .await
            .unwrap();
        let second = resolver
            .resolve("user-2", "Acme Corp", None, now)
            .await
            .unwrap();
        assert!(second.created);
        assert_ne!(second.vendor.id, first.vendor.id);
    }

    #[tokio::test]
    async fn test_tie_breaks_on_most_recently_seen() {
        let (resolver, store) = resolver();
        let base = Utc::now();
        let mut old = Vendor::new("user-1", "Vendor Alpha Old", base).unwrap();
        old.normalized_name = "vendor alpha".to_string();
        old.last_seen_at = base - TimeDelta::days(30);
        let mut fresh = Vendor::new("user-1", "Vendor Alpha Fresh", base).unwrap();
        fresh.normalized_name = "vendor alpha".to_string();
        fresh.last_seen_at = base;
        store.insert(old.clone()).await.unwrap();
        store.insert(fresh.clone()).await.unwrap();

        let resolution = resolver
            .resolve("user-1", "Vendor Alpha", None, base)
            .await
            .unwrap();
        assert!(!resolution.created);
        assert_eq!(resolution.vendor.id, fresh.id);
    }

    #[tokio::test]
    async fn test_sighting_refreshes_last_seen() {
        let (resolver, store) = resolver();
        let created_at = Utc::now() - TimeDelta::days(10);
        let first = resolver
            .resolve("user-1", "Acme Corp", None, created_at)
            .await
            .unwrap();

        let later = Utc::now();
        resolver
            .resolve("user-1", "Acme Corp", None, later)
            .await
            .unwrap();
        let stored = store.get(first.vendor.id).await.unwrap().unwrap();
        assert_eq!(stored.last_seen_at, later);
    }

    #[tokio::test]
    async fn test_cache_survives_clearing_without_wrong_answers() {
        let (resolver, _) = resolver();
        let now = Utc::now();
        let first = resolver
            .resolve("user-1", "Acme Corp", None, now)
            .await
            .unwrap();
        resolver.clear_cache().await;
        let second = resolver
            .resolve("user-1", "Acme Corp", None, now)
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.vendor.id, first.vendor.id);
    }
}
