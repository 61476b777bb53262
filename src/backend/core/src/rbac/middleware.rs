//! Axum glue between authenticated requests and the ability evaluator.
//!
//! Authentication happens upstream. The gateway forwards the caller's id in a
//! header; [`IdentifyCallerLayer`] lifts it into a [`CurrentUser`] extension,
//! and handlers resolve an [`RbacContext`] for the organization they touch.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderName},
    response::Response,
};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

use super::ability::Ability;
use super::models::{Membership, Organization, User, UserId};
use super::policy::PolicyEngine;
use super::schemas::{OrganizationSubject, ResourceInstance, SubjectSchema};
use crate::error::{AppError, Result};

/// Header carrying the authenticated caller id unless configured otherwise.
pub const DEFAULT_USER_ID_HEADER: &str = "x-user-id";

// ═══════════════════════════════════════════════════════════════════════════════
// Current User
// ═══════════════════════════════════════════════════════════════════════════════

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Invalid auth token."))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Identify Caller Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Inserts [`CurrentUser`] when the identity header is present.
///
/// Requests without it pass through untouched; routes that need a caller
/// reject them through the extractor.
#[derive(Debug, Clone)]
pub struct IdentifyCallerLayer {
    header: HeaderName,
}

impl IdentifyCallerLayer {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Default for IdentifyCallerLayer {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_USER_ID_HEADER))
    }
}

impl<S> Layer<S> for IdentifyCallerLayer {
    type Service = IdentifyCaller<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdentifyCaller {
            inner,
            header: self.header.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentifyCaller<S> {
    inner: S,
    header: HeaderName,
}

impl<S> Service<Request<Body>> for IdentifyCaller<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let caller = request
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CurrentUser { id: UserId::new(v) });

        if let Some(caller) = caller {
            debug!(user_id = %caller.id, "Identified caller");
            request.extensions_mut().insert(caller);
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership Resolution
// ═══════════════════════════════════════════════════════════════════════════════

/// An organization together with the caller's membership in it.
#[derive(Debug, Clone)]
pub struct MembershipContext {
    pub organization: Organization,
    pub membership: Membership,
}

/// Looks up a caller's membership in an organization by slug.
#[async_trait]
pub trait MembershipResolver: Send + Sync {
    /// `NotFound` when the organization does not exist or the caller is not
    /// a member of it.
    async fn resolve_membership(&self, user_id: &UserId, slug: &str) -> Result<MembershipContext>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RBAC Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a handler needs to authorize work inside one organization.
#[derive(Debug, Clone)]
pub struct RbacContext {
    pub user: User,
    pub organization: Organization,
    pub membership: Membership,
    pub ability: Ability,
}

impl RbacContext {
    /// Resolve the caller's membership in `slug` and build their ability.
    pub async fn resolve<R>(
        engine: &PolicyEngine,
        resolver: &R,
        caller: &CurrentUser,
        slug: &str,
    ) -> Result<Self>
    where
        R: MembershipResolver + ?Sized,
    {
        let MembershipContext {
            organization,
            membership,
        } = resolver.resolve_membership(&caller.id, slug).await?;

        let user = User::new(caller.id.clone()).with_membership(membership.clone());
        let ability = engine.build_ability(&user, membership.role)?;

        Ok(Self {
            user,
            organization,
            membership,
            ability,
        })
    }

    /// The organization as a validated subject for instance checks.
    pub fn organization_subject(&self) -> Result<ResourceInstance> {
        let subject = OrganizationSubject {
            id: self.organization.id.to_string(),
            owner_id: Some(self.organization.owner_id.to_string()),
        };
        Ok(subject.parse()?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
