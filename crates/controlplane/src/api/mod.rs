pub mod admin;
pub mod api_keys;
pub mod apis;
pub mod auth;
pub mod certificates;
pub mod correlation;
pub mod policies;
pub mod resources;
pub mod response;
pub mod templates;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (health only) and **protected**
/// (everything else, gated behind the bearer-token middleware). The
/// correlation middleware wraps both.
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(admin::health));

    let protected = Router::new()
        // APIs (REST + WebSub kinds, by handle)
        .route("/apis", post(apis::create_api))
        .route("/apis", get(apis::list_apis))
        .route("/apis/:handle", get(apis::get_api))
        .route("/apis/:handle", put(apis::update_api))
        .route("/apis/:handle", delete(apis::delete_api))
        // :handle doubles as the display name here; the segment count
        // disambiguates, and the router needs one param name per position.
        .route("/apis/:handle/:version", get(apis::get_api_by_name_version))
        // API keys
        .route("/apis/:handle/api-keys", post(api_keys::create_api_key))
        .route("/apis/:handle/api-keys", get(api_keys::list_api_keys))
        .route(
            "/apis/:handle/api-keys/:name",
            put(api_keys::update_api_key),
        )
        .route(
            "/apis/:handle/api-keys/:name",
            delete(api_keys::revoke_api_key),
        )
        .route(
            "/apis/:handle/api-keys/:name/regenerate",
            post(api_keys::regenerate_api_key),
        )
        // LLM provider templates
        .route("/llm-provider-templates", post(templates::create_template))
        .route("/llm-provider-templates", get(templates::list_templates))
        .route("/llm-provider-templates/:id", get(templates::get_template))
        .route(
            "/llm-provider-templates/:id",
            put(templates::update_template),
        )
        .route(
            "/llm-provider-templates/:id",
            delete(templates::delete_template),
        )
        // LLM providers
        .route("/llm-providers", post(resources::llm_providers::create))
        .route("/llm-providers", get(resources::llm_providers::list))
        .route("/llm-providers/:id", get(resources::llm_providers::get))
        .route("/llm-providers/:id", put(resources::llm_providers::update))
        .route(
            "/llm-providers/:id",
            delete(resources::llm_providers::delete),
        )
        // LLM proxies
        .route("/llm-proxies", post(resources::llm_proxies::create))
        .route("/llm-proxies", get(resources::llm_proxies::list))
        .route("/llm-proxies/:id", get(resources::llm_proxies::get))
        .route("/llm-proxies/:id", put(resources::llm_proxies::update))
        .route("/llm-proxies/:id", delete(resources::llm_proxies::delete))
        // MCP proxies
        .route("/mcp-proxies", post(resources::mcp_proxies::create))
        .route("/mcp-proxies", get(resources::mcp_proxies::list))
        .route("/mcp-proxies/:id", get(resources::mcp_proxies::get))
        .route("/mcp-proxies/:id", put(resources::mcp_proxies::update))
        .route("/mcp-proxies/:id", delete(resources::mcp_proxies::delete))
        // Certificates
        .route("/certificates", post(certificates::create_certificate))
        .route("/certificates", get(certificates::list_certificates))
        .route("/certificates/:id", get(certificates::get_certificate))
        .route(
            "/certificates/:id",
            delete(certificates::delete_certificate),
        )
        // Derived policies
        .route("/policies", get(policies::list_policies))
        // Config dump
        .route("/config_dump", get(admin::config_dump))
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public
        .merge(protected)
        .layer(middleware::from_fn(correlation::correlation_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
