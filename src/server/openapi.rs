//! OpenAPI documentation and Swagger UI integration.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::AppContext;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Renderforged API",
        version = "0.1.0",
        description = "Submit template video renders, poll their progress and download the results",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "/", description = "Default server")
    ),
    paths(
        super::routes_render::health,
        super::routes_render::submit_render,
        super::routes_render::get_render,
        super::routes_render::list_renders,
        super::routes_render::delete_render,
        super::routes_render::download_artifact,
    ),
    components(
        schemas(
            super::routes_render::HealthResponse,
            super::routes_render::RenderRequest,
            super::routes_render::RenderAccepted,
            super::routes_render::RenderResponse,
            super::routes_render::RenderListResponse,
            super::routes_render::DeleteResponse,
            crate::state::RenderJob,
            crate::state::RenderStatus,
        )
    ),
    tags(
        (name = "health", description = "Liveness probe"),
        (name = "renders", description = "Render job submission and tracking"),
    )
)]
pub struct ApiDoc;

/// Create OpenAPI documentation routes.
/// - `/docs` - Swagger UI
/// - `/openapi.json` - Raw OpenAPI JSON spec (served by SwaggerUi)
pub fn openapi_routes() -> Router<AppContext> {
    Router::new().merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}
