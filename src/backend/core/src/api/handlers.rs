//! API request handlers.
//!
//! Handlers return `Result<impl IntoResponse, AppError>`; error bodies and
//! status codes come from the `IntoResponse` implementation on `AppError`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::AppState;
use crate::error::{AppError, Result};
use crate::rbac::{Action, CurrentUser, OrganizationId, RbacContext, Role, UserId};
use crate::store::{create_slug, OrganizationDetails};
use crate::validation::{
    validate_field, validate_request, Domain, Identifier, MaxLength, Required, Slug, Validate,
    ValidationErrorKind, ValidationResult,
};

const MAX_ORGANIZATION_NAME_LENGTH: usize = 120;

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Profile
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn get_profile(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<impl IntoResponse> {
    let user = state
        .store
        .user_profile(&caller.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found."))?;

    Ok(Json(json!({ "user": user })))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request Bodies
// ═══════════════════════════════════════════════════════════════════════════════

/// Body of organization create and update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRequest {
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub should_attach_users_by_domain: bool,
}

impl Validate for OrganizationRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_request()
            .field(
                validate_field("name", &self.name)
                    .stop_on_first()
                    .rule(Required)
                    .rule(MaxLength(MAX_ORGANIZATION_NAME_LENGTH))
                    .must(
                        |name| !create_slug(name).is_empty(),
                        ValidationErrorKind::Custom {
                            code: "unsluggable".into(),
                        },
                    ),
            )
            .field(validate_field("domain", &self.domain).rule(Domain))
            .result()
    }
}

impl From<OrganizationRequest> for OrganizationDetails {
    fn from(request: OrganizationRequest) -> Self {
        Self {
            name: request.name.trim().to_string(),
            domain: request.domain,
            should_attach_users_by_domain: request.should_attach_users_by_domain,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOwnershipRequest {
    pub transfer_to_user_id: String,
}

impl Validate for TransferOwnershipRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_field("transferToUserId", &self.transfer_to_user_id)
            .rule(Identifier)
            .result()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationResponse {
    pub organization_id: OrganizationId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Organization Handlers
// ═══════════════════════════════════════════════════════════════════════════════

async fn organization_context(
    state: &AppState,
    caller: &CurrentUser,
    slug: &str,
) -> Result<RbacContext> {
    validate_field("slug", &slug.to_owned()).rule(Slug).result()?;
    RbacContext::resolve(&state.engine, state.store.as_ref(), caller, slug).await
}

pub async fn create_organization(
    State(state): State<AppState>,
    caller: CurrentUser,
    payload: std::result::Result<Json<OrganizationRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload?;
    let request = request.validated()?;

    let organization = state
        .store
        .create_organization(&caller.id, request.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrganizationResponse {
            organization_id: organization.id,
        }),
    ))
}

pub async fn list_organizations(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<impl IntoResponse> {
    let organizations: Vec<OrganizationSummary> = state
        .store
        .organizations_of(&caller.id)
        .await?
        .into_iter()
        .map(|(org, role)| OrganizationSummary {
            id: org.id,
            name: org.name,
            slug: org.slug,
            avatar_url: org.avatar_url,
            role,
        })
        .collect();

    Ok(Json(json!({ "organizations": organizations })))
}

pub async fn get_organization(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let ctx = organization_context(&state, &caller, &slug).await?;
    Ok(Json(json!({ "organization": ctx.organization })))
}

pub async fn get_membership(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let ctx = organization_context(&state, &caller, &slug).await?;
    Ok(Json(json!({
        "membership": {
            "id": ctx.membership.id,
            "role": ctx.membership.role,
            "organizationId": ctx.membership.organization_id,
        }
    })))
}

/// The caller's rules inside the organization, for clients that mirror
/// permission checks in their UI.
pub async fn get_abilities(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let ctx = organization_context(&state, &caller, &slug).await?;
    Ok(Json(json!({
        "role": ctx.membership.role,
        "rules": ctx.ability.rules(),
    })))
}

pub async fn update_organization(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(slug): Path<String>,
    payload: std::result::Result<Json<OrganizationRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(request) = payload?;
    let request = request.validated()?;

    let ctx = organization_context(&state, &caller, &slug).await?;
    let organization = ctx.organization_subject()?;

    ctx.ability.enforce(
        Action::Update,
        &organization,
        "You are not allowed to update this organization.",
    )?;

    state
        .store
        .update_organization(&ctx.organization.id, request.into())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn shutdown_organization(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(slug): Path<String>,
) -> Result<StatusCode> {
    let ctx = organization_context(&state, &caller, &slug).await?;
    let organization = ctx.organization_subject()?;

    ctx.ability.enforce(
        Action::Delete,
        &organization,
        "You're not allowed to shutdown this organization.",
    )?;

    state.store.delete_organization(&ctx.organization.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn transfer_ownership(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(slug): Path<String>,
    payload: std::result::Result<Json<TransferOwnershipRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(request) = payload?;
    let request = request.validated()?;

    let ctx = organization_context(&state, &caller, &slug).await?;
    let organization = ctx.organization_subject()?;

    ctx.ability.enforce(
        Action::TransferOwnership,
        &organization,
        "You're not allowed to transfer this organization ownership.",
    )?;

    state
        .store
        .transfer_ownership(&ctx.organization.id, &UserId::new(request.transfer_to_user_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
