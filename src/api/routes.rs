use axum::Router;
use axum::routing::{get, post};

use super::handlers;
use crate::filtering::{admin, enforce};
use crate::state::AppState;

/// Assembles the flat route table of spec.md §4.4: `/`, `/new_channel`,
/// `/report`, and `/{cid}` for the channel GET/PUT/DELETE trio, with the
/// abuse-mitigation filter wrapping everything except the admin page.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::health))
        .route("/new_channel", get(handlers::new_channel))
        .route("/report", post(handlers::report))
        .route(
            "/{cid}",
            get(handlers::get_channel)
                .put(handlers::put_channel)
                .delete(handlers::delete_channel),
        );

    if let Some(admin_page) = state.filtering.admin_page.clone() {
        router = router.route(&admin_page, get(admin::show).post(admin::unblock));
    }

    router
        .layer(axum::middleware::from_fn_with_state(
            state.filtering.clone(),
            enforce,
        ))
        .with_state(state)
}
