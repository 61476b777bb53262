//! Organization storage.
//!
//! [`OrganizationStore`] is the persistence seam the HTTP handlers talk to.
//! [`InMemoryStore`] backs it with concurrent maps and is what the server
//! runs with out of the box.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::rbac::{
    Membership, MembershipContext, MembershipResolver, Organization, OrganizationId, Role, UserId,
    UserProfile,
};

/// Editable organization fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDetails {
    pub name: String,
    pub domain: Option<String>,
    #[serde(default)]
    pub should_attach_users_by_domain: bool,
}

/// Turn a display name into a URL slug: `"Acme Inc."` becomes `"acme-inc"`.
pub fn create_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') && (c.is_whitespace() || c == '-' || c == '_') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store Trait
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait OrganizationStore: MembershipResolver {
    async fn register_user(&self, profile: UserProfile) -> Result<()>;

    async fn user_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>>;

    /// Create an organization owned by `owner`, who also becomes its first
    /// ADMIN member.
    async fn create_organization(
        &self,
        owner: &UserId,
        details: OrganizationDetails,
    ) -> Result<Organization>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>>;

    /// Organization using `domain`, ignoring `excluding`.
    async fn find_by_domain(
        &self,
        domain: &str,
        excluding: Option<&OrganizationId>,
    ) -> Result<Option<Organization>>;

    /// Every organization `user_id` belongs to, with their role there.
    async fn organizations_of(&self, user_id: &UserId) -> Result<Vec<(Organization, Role)>>;

    async fn update_organization(
        &self,
        id: &OrganizationId,
        details: OrganizationDetails,
    ) -> Result<Organization>;

    /// Remove an organization and all of its memberships.
    async fn delete_organization(&self, id: &OrganizationId) -> Result<()>;

    async fn add_member(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
        role: Role,
    ) -> Result<Membership>;

    /// Make `new_owner`, who must already be a member, the owner and an ADMIN.
    async fn transfer_ownership(&self, id: &OrganizationId, new_owner: &UserId) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Slugs and domains are unique across organizations. Both are claimed in
/// their index maps through the entry API before the organization is
/// inserted, so concurrent writers cannot both win the same value.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: DashMap<UserId, UserProfile>,
    organizations: DashMap<OrganizationId, Organization>,
    memberships: DashMap<(OrganizationId, UserId), Membership>,
    slugs: DashMap<String, OrganizationId>,
    domains: DashMap<String, OrganizationId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn membership(&self, organization_id: &OrganizationId, user_id: &UserId) -> Option<Membership> {
        self.memberships
            .get(&(organization_id.clone(), user_id.clone()))
            .map(|m| m.value().clone())
    }

    fn organization(&self, id: &OrganizationId) -> Option<Organization> {
        self.organizations.get(id).map(|o| o.value().clone())
    }

    fn claim_slug(&self, slug: &str, id: &OrganizationId) -> Result<()> {
        match self.slugs.entry(slug.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(id.clone());
                Ok(())
            }
            Entry::Occupied(_) => Err(AppError::conflict(
                "Another organization with same slug already exists.",
            )),
        }
    }

    /// Returns whether the claim is new; `false` means `id` already held it.
    fn claim_domain(&self, domain: &str, id: &OrganizationId) -> Result<bool> {
        match self.domains.entry(domain.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(id.clone());
                Ok(true)
            }
            Entry::Occupied(entry) if entry.get() == id => Ok(false),
            Entry::Occupied(_) => Err(AppError::conflict(
                "Another organization with same domain already exists.",
            )),
        }
    }

    fn release(index: &DashMap<String, OrganizationId>, key: &str, id: &OrganizationId) {
        index.remove_if(key, |_, owner| owner == id);
    }
}

#[async_trait]
impl MembershipResolver for InMemoryStore {
    async fn resolve_membership(&self, user_id: &UserId, slug: &str) -> Result<MembershipContext> {
        let organization = self
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::not_found("Organization not found."))?;

        let membership = self
            .membership(&organization.id, user_id)
            .ok_or_else(|| {
                AppError::not_found("Organization not found.")
                    .with_internal_message(format!("user {} is not a member of {}", user_id, slug))
            })?;

        Ok(MembershipContext {
            organization,
            membership,
        })
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn register_user(&self, profile: UserProfile) -> Result<()> {
        debug!(user_id = %profile.id, "Registering user");
        self.users.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn user_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn create_organization(
        &self,
        owner: &UserId,
        details: OrganizationDetails,
    ) -> Result<Organization> {
        let slug = create_slug(&details.name);
        let mut organization = Organization::new(details.name, slug, owner.clone());
        organization.domain = details.domain;
        organization.should_attach_users_by_domain = details.should_attach_users_by_domain;

        self.claim_slug(&organization.slug, &organization.id)?;
        if let Some(domain) = &organization.domain {
            if let Err(e) = self.claim_domain(domain, &organization.id) {
                Self::release(&self.slugs, &organization.slug, &organization.id);
                return Err(e);
            }
        }

        let membership = Membership::new(owner.clone(), organization.id.clone(), Role::Admin);
        self.memberships
            .insert((organization.id.clone(), owner.clone()), membership);
        self.organizations
            .insert(organization.id.clone(), organization.clone());

        info!(
            organization_id = %organization.id,
            slug = %organization.slug,
            owner_id = %owner,
            "Organization created"
        );
        Ok(organization)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        let id = self.slugs.get(slug).map(|id| id.value().clone());
        Ok(id.and_then(|id| self.organization(&id)))
    }

    async fn find_by_domain(
        &self,
        domain: &str,
        excluding: Option<&OrganizationId>,
    ) -> Result<Option<Organization>> {
        let id = self
            .domains
            .get(domain)
            .map(|id| id.value().clone())
            .filter(|id| Some(id) != excluding);
        Ok(id.and_then(|id| self.organization(&id)))
    }

    async fn organizations_of(&self, user_id: &UserId) -> Result<Vec<(Organization, Role)>> {
        let memberships: Vec<(OrganizationId, Role)> = self
            .memberships
            .iter()
            .filter(|m| &m.user_id == user_id)
            .map(|m| (m.organization_id.clone(), m.role))
            .collect();

        let mut result: Vec<(Organization, Role)> = memberships
            .into_iter()
            .filter_map(|(id, role)| self.organization(&id).map(|o| (o, role)))
            .collect();
        result.sort_by(|a, b| a.0.created_at.cmp(&b.0.created_at).then_with(|| a.0.slug.cmp(&b.0.slug)));
        Ok(result)
    }

    async fn update_organization(
        &self,
        id: &OrganizationId,
        details: OrganizationDetails,
    ) -> Result<Organization> {
        let claimed = match &details.domain {
            Some(domain) => self.claim_domain(domain, id)?,
            None => false,
        };

        let Some(mut entry) = self.organizations.get_mut(id) else {
            if let (true, Some(domain)) = (claimed, &details.domain) {
                Self::release(&self.domains, domain, id);
            }
            return Err(AppError::not_found("Organization not found."));
        };

        let previous = std::mem::replace(&mut entry.domain, details.domain);
        entry.name = details.name;
        entry.should_attach_users_by_domain = details.should_attach_users_by_domain;
        entry.updated_at = Utc::now();
        let organization = entry.value().clone();
        drop(entry);

        if let Some(previous) = previous.filter(|d| organization.domain.as_ref() != Some(d)) {
            Self::release(&self.domains, &previous, id);
        }

        debug!(organization_id = %id, "Organization updated");
        Ok(organization)
    }

    async fn delete_organization(&self, id: &OrganizationId) -> Result<()> {
        let (_, organization) = self
            .organizations
            .remove(id)
            .ok_or_else(|| AppError::not_found("Organization not found."))?;

        Self::release(&self.slugs, &organization.slug, id);
        if let Some(domain) = &organization.domain {
            Self::release(&self.domains, domain, id);
        }
        self.memberships.retain(|(org_id, _), _| org_id != id);

        info!(organization_id = %id, "Organization shut down");
        Ok(())
    }

    async fn add_member(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
        role: Role,
    ) -> Result<Membership> {
        // Held until the membership is in, so a concurrent delete cannot
        // leave it orphaned.
        let _organization = self
            .organizations
            .get(organization_id)
            .ok_or_else(|| AppError::not_found("Organization not found."))?;

        match self
            .memberships
            .entry((organization_id.clone(), user_id.clone()))
        {
            Entry::Occupied(_) => Err(AppError::conflict(
                "User is already a member of this organization.",
            )),
            Entry::Vacant(entry) => {
                let membership = Membership::new(user_id.clone(), organization_id.clone(), role);
                entry.insert(membership.clone());
                Ok(membership)
            }
        }
    }

    async fn transfer_ownership(&self, id: &OrganizationId, new_owner: &UserId) -> Result<()> {
        // Lock order: organization, then membership.
        let mut organization = self
            .organizations
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Organization not found."))?;
        let mut membership = self
            .memberships
            .get_mut(&(id.clone(), new_owner.clone()))
            .ok_or_else(|| {
                AppError::bad_request("Target user is not a member of this organization.")
            })?;

        membership.role = Role::Admin;
        organization.owner_id = new_owner.clone();
        organization.updated_at = Utc::now();

        info!(organization_id = %id, new_owner = %new_owner, "Ownership transferred");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Barrier;

    use super::*;
    use crate::error::ErrorCode;

    fn details(name: &str, domain: Option<&str>) -> OrganizationDetails {
        OrganizationDetails {
            name: name.into(),
            domain: domain.map(String::from),
            should_attach_users_by_domain: false,
        }
    }

    #[test]
    fn test_create_slug() {
        assert_eq!(create_slug("Acme Inc."), "acme-inc");
        assert_eq!(create_slug("  Rocket   Seat  "), "rocket-seat");
        assert_eq!(create_slug("a_b-c"), "a-b-c");
    }

    #[tokio::test]
    async fn test_creator_becomes_admin_owner() {
        let store = InMemoryStore::new();
        let owner = UserId::new("123");
        let org = store
            .create_organization(&owner, details("Acme", Some("acme.com")))
            .await
            .unwrap();

        assert!(org.is_owned_by(&owner));
        let ctx = store.resolve_membership(&owner, "acme").await.unwrap();
        assert_eq!(ctx.membership.role, Role::Admin);

        let orgs = store.organizations_of(&owner).await.unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].1, Role::Admin);
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let store = InMemoryStore::new();
        let owner = UserId::new("123");
        store.create_organization(&owner, details("Acme", None)).await.unwrap();
        let err = store
            .create_organization(&owner, details("acme", None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_non_member_cannot_resolve() {
        let store = InMemoryStore::new();
        store
            .create_organization(&UserId::new("123"), details("Acme", None))
            .await
            .unwrap();

        let err = store
            .resolve_membership(&UserId::new("999"), "acme")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        let err = store
            .resolve_membership(&UserId::new("123"), "missing")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_find_by_domain_excludes_self() {
        let store = InMemoryStore::new();
        let org = store
            .create_organization(&UserId::new("123"), details("Acme", Some("acme.com")))
            .await
            .unwrap();

        assert!(store.find_by_domain("acme.com", None).await.unwrap().is_some());
        assert!(store
            .find_by_domain("acme.com", Some(&org.id))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryStore::new();
        let owner = UserId::new("123");
        let org = store.create_organization(&owner, details("Acme", None)).await.unwrap();

        let updated = store
            .update_organization(&org.id, details("Acme Corp", Some("acme.io")))
            .await
            .unwrap();
        assert_eq!(updated.name, "Acme Corp");
        assert_eq!(updated.slug, "acme");

        store.delete_organization(&org.id).await.unwrap();
        assert!(store.find_by_slug("acme").await.unwrap().is_none());
        assert!(store.organizations_of(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_ownership() {
        let store = InMemoryStore::new();
        let owner = UserId::new("123");
        let heir = UserId::new("456");
        let org = store.create_organization(&owner, details("Acme", None)).await.unwrap();

        let err = store.transfer_ownership(&org.id, &heir).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);

        store.add_member(&org.id, &heir, Role::Member).await.unwrap();
        store.transfer_ownership(&org.id, &heir).await.unwrap();

        let ctx = store.resolve_membership(&heir, "acme").await.unwrap();
        assert_eq!(ctx.membership.role, Role::Admin);
        assert!(ctx.organization.is_owned_by(&heir));
    }

    #[tokio::test]
    async fn test_add_member_twice_conflicts() {
        let store = InMemoryStore::new();
        let owner = UserId::new("123");
        let org = store.create_organization(&owner, details("Acme", None)).await.unwrap();
        let err = store.add_member(&org.id, &owner, Role::Billing).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_domain_taken_on_create_and_update() {
        let store = InMemoryStore::new();
        let owner = UserId::new("123");
        store
            .create_organization(&owner, details("Acme", Some("acme.com")))
            .await
            .unwrap();
        let globex = store
            .create_organization(&owner, details("Globex", Some("globex.com")))
            .await
            .unwrap();

        let err = store
            .create_organization(&owner, details("Initech", Some("acme.com")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
        // The failed create must not keep its slug.
        assert!(store.find_by_slug("initech").await.unwrap().is_none());
        store.create_organization(&owner, details("Initech", None)).await.unwrap();

        let err = store
            .update_organization(&globex.id, details("Globex", Some("acme.com")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);

        // Keeping its own domain is fine; moving off it frees the old one.
        store
            .update_organization(&globex.id, details("Globex", Some("globex.com")))
            .await
            .unwrap();
        store
            .update_organization(&globex.id, details("Globex", Some("globex.io")))
            .await
            .unwrap();
        assert!(store.find_by_domain("globex.com", None).await.unwrap().is_none());
        assert_eq!(
            store.find_by_domain("globex.io", None).await.unwrap().map(|o| o.id),
            Some(globex.id)
        );
    }

    #[tokio::test]
    async fn test_delete_frees_slug_and_domain() {
        let store = InMemoryStore::new();
        let owner = UserId::new("123");
        let org = store
            .create_organization(&owner, details("Acme", Some("acme.com")))
            .await
            .unwrap();
        store.delete_organization(&org.id).await.unwrap();

        let again = store
            .create_organization(&owner, details("Acme", Some("acme.com")))
            .await
            .unwrap();
        assert_ne!(again.id, org.id);
        assert_eq!(store.find_by_slug("acme").await.unwrap().map(|o| o.id), Some(again.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_claim_slug_once() {
        const WRITERS: usize = 4;
        const ROUNDS: usize = 50;

        let store = Arc::new(InMemoryStore::new());
        let owner = UserId::new("123");
        for i in 0..200 {
            store
                .create_organization(&owner, details(&format!("Seed {}", i), None))
                .await
                .unwrap();
        }

        for round in 0..ROUNDS {
            let barrier = Arc::new(Barrier::new(WRITERS));
            let handles: Vec<_> = (0..WRITERS)
                .map(|writer| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    let owner = UserId::new(format!("writer-{}", writer));
                    tokio::spawn(async move {
                        barrier.wait().await;
                        store
                            .create_organization(&owner, details(&format!("Acme {}", round), None))
                            .await
                    })
                })
                .collect();

            let mut created = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => created += 1,
                    Err(e) => assert_eq!(e.code(), ErrorCode::Conflict),
                }
            }
            assert_eq!(created, 1, "round {}", round);

            let slug = format!("acme-{}", round);
            let same_slug = store.organizations.iter().filter(|o| o.slug == slug).count();
            assert_eq!(same_slug, 1, "round {}", round);
        }
        assert_eq!(store.organizations.len(), 200 + ROUNDS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_claim_domain_once() {
        let store = Arc::new(InMemoryStore::new());
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    store
                        .create_organization(
                            &UserId::new("123"),
                            details(&format!("Tenant {}", i), Some("shared.com")),
                        )
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.organizations.len(), 1);
        // Losers released their slugs.
        assert_eq!(store.slugs.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_member_inserts_once() {
        let store = Arc::new(InMemoryStore::new());
        let org = store
            .create_organization(&UserId::new("123"), details("Acme", None))
            .await
            .unwrap();

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let org_id = org.id.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    store.add_member(&org_id, &UserId::new("456"), Role::Member).await
                })
            })
            .collect();

        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                added += 1;
            }
        }
        assert_eq!(added, 1);
        assert_eq!(store.memberships.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transfers_leave_consistent_owner() {
        let store = Arc::new(InMemoryStore::new());
        let org = store
            .create_organization(&UserId::new("123"), details("Acme", None))
            .await
            .unwrap();
        let heirs: Vec<UserId> = (0..4).map(|i| UserId::new(format!("heir-{}", i))).collect();
        for heir in &heirs {
            store.add_member(&org.id, heir, Role::Member).await.unwrap();
        }

        let barrier = Arc::new(Barrier::new(heirs.len()));
        let handles: Vec<_> = heirs
            .iter()
            .cloned()
            .map(|heir| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let org_id = org.id.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    store.transfer_ownership(&org_id, &heir).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let owner = store.organization(&org.id).unwrap().owner_id;
        assert!(heirs.contains(&owner));
        assert_eq!(store.membership(&org.id, &owner).unwrap().role, Role::Admin);
    }
}
