//! Tenant authorizer for the edge.
//!
//! Validates the caller's bearer JWT, resolves the tenant and tier from its
//! claims, selects the usage-plan API key for that tier, and decides which
//! services the caller may reach. Tenant admins may call every service;
//! other users only those not flagged admin-only.
//!
//! Decisions are cached per token for 30 seconds. A cached decision is
//! served without re-validating the token.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tenantgrid_core::Tier;
use tracing::{debug, warn};

use crate::edge::EdgeDescriptor;
use crate::error::{GatewayError, GatewayResult};
use crate::usage_plan::{plan_for, UsagePlan};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

pub const TIER_CLAIM: &str = "custom:tenantTier";
pub const ROLE_CLAIM: &str = "custom:userRole";
pub const USERNAME_CLAIM: &str = "cognito:username";
pub const SUBJECT_CLAIM: &str = "sub";

const ADMIN_ROLES: &[&str] = &["TenantAdmin", "SystemAdmin"];

pub fn is_tenant_admin(role: &str) -> bool {
    ADMIN_ROLES.iter().any(|r| r.eq_ignore_ascii_case(role))
}

/// What the authorizer hands to the edge for an accepted caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerContext {
    pub tenant_id: String,
    /// Value of the `tenantPath` header on forwarded requests.
    pub tenant_path: String,
    pub tier: Tier,
    pub api_key: String,
    pub user_role: String,
    pub username: String,
    pub principal_id: String,
    pub allowed_services: Vec<String>,
}

impl AuthorizerContext {
    pub fn may_call(&self, service: &str) -> bool {
        self.allowed_services.iter().any(|s| s == service)
    }
}

struct CachedDecision {
    context: AuthorizerContext,
    expires_at: Instant,
}

pub struct Authorizer {
    key: DecodingKey,
    validation: Validation,
    tenant_id_claim: String,
    /// Service name → admin only.
    services: Vec<(String, bool)>,
    plans: Vec<UsagePlan>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedDecision>>,
}

impl Authorizer {
    /// Authorizer for an edge, validating HS256 tokens signed with `secret`.
    pub fn new(secret: &[u8], edge: &EdgeDescriptor) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            tenant_id_claim: edge.authorizer.tenant_id_claim.clone(),
            services: edge
                .services()
                .into_iter()
                .map(|(s, admin)| (s.to_string(), admin))
                .collect(),
            plans: edge.usage_plans.clone(),
            ttl: Duration::from_secs(edge.authorizer.cache_ttl_secs),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Authorize an `Authorization` header value.
    pub fn authorize(&self, authorization: Option<&str>) -> GatewayResult<AuthorizerContext> {
        self.authorize_at(authorization, Instant::now())
    }

    /// Authorize as of `now`. Cache expiry is judged against `now`.
    pub fn authorize_at(
        &self,
        authorization: Option<&str>,
        now: Instant,
    ) -> GatewayResult<AuthorizerContext> {
        let token = bearer_token(authorization)?;

        if let Some(context) = self.cached(token, now) {
            debug!(tenant_id = %context.tenant_id, "authorizer cache hit");
            return Ok(context);
        }

        let context = self.evaluate(token)?;
        let mut cache = self.cache.lock().expect("authorizer cache lock");
        cache.retain(|_, d| d.expires_at > now);
        cache.insert(
            token.to_string(),
            CachedDecision {
                context: context.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(context)
    }

    /// The cached decision for a token, if still fresh at `now`.
    pub fn cached(&self, token: &str, now: Instant) -> Option<AuthorizerContext> {
        let cache = self.cache.lock().expect("authorizer cache lock");
        cache
            .get(token)
            .filter(|d| d.expires_at > now)
            .map(|d| d.context.clone())
    }

    fn evaluate(&self, token: &str) -> GatewayResult<AuthorizerContext> {
        let data = decode::<BTreeMap<String, serde_json::Value>>(token, &self.key, &self.validation)
            .map_err(|e| {
                warn!(error = %e, "rejected token");
                GatewayError::InvalidToken(e.to_string())
            })?;
        let claims = data.claims;

        let tenant_id = required_claim(&claims, &self.tenant_id_claim)?;
        let principal_id = required_claim(&claims, SUBJECT_CLAIM)?;
        let username = string_claim(&claims, USERNAME_CLAIM).unwrap_or_default();
        let user_role = string_claim(&claims, ROLE_CLAIM).unwrap_or_default();

        let tier = match string_claim(&claims, TIER_CLAIM) {
            Some(raw) => Tier::parse_lenient(&raw).unwrap_or_else(|| {
                warn!(tenant_id = %tenant_id, tier = %raw, "unknown tier claim, using basic plan");
                Tier::Basic
            }),
            None => Tier::Basic,
        };
        let api_key = plan_for(&self.plans, tier)
            .map(|p| p.api_key.value.clone())
            .unwrap_or_default();

        let admin = is_tenant_admin(&user_role);
        let allowed_services = self
            .services
            .iter()
            .filter(|(_, admin_only)| admin || !admin_only)
            .map(|(s, _)| s.clone())
            .collect();

        debug!(tenant_id = %tenant_id, %tier, role = %user_role, "token authorized");
        Ok(AuthorizerContext {
            tenant_path: tenant_id.clone(),
            tenant_id,
            tier,
            api_key,
            user_role,
            username,
            principal_id,
            allowed_services,
        })
    }
}

fn bearer_token(authorization: Option<&str>) -> GatewayResult<&str> {
    let header = authorization.ok_or(GatewayError::MissingToken)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(GatewayError::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(GatewayError::MalformedHeader);
    }
    Ok(token)
}

fn string_claim(claims: &BTreeMap<String, serde_json::Value>, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required_claim(claims: &BTreeMap<String, serde_json::Value>, name: &str) -> GatewayResult<String> {
    string_claim(claims, name).ok_or_else(|| GatewayError::MissingClaim(name.to_string()))
}
