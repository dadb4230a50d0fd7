//! OpenAPI document assembled from the handler annotations.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{blocking, operator, pool, system};
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "poolshield-gateway",
        description = "Click-fraud protection pools: city + sector pools, memberships, and a shared blocklist."
    ),
    paths(
        system::health_handler,
        operator::create_pool,
        operator::operator_stats,
        operator::list_cities,
        pool::register_pool,
        pool::list_pools,
        pool::list_my_pools,
        pool::join_pool,
        pool::get_pool,
        pool::pool_stats,
        pool::pool_members,
        blocking::list_blocked_ips,
        blocking::record_blocked_ip,
        blocking::report_suspicious_click,
        blocking::check_ip,
        blocking::apply_global_block,
    ),
    components(schemas(ErrorResponse, ErrorBody)),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Operator", description = "Pool creation and cross-pool statistics"),
        (name = "Pools", description = "Pool lookup and membership"),
        (name = "Blocklist", description = "Shared blocked addresses"),
        (name = "Admin", description = "Global blocks"),
    )
)]
pub struct ApiDoc;

#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
