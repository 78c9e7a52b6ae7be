//! HTTP routes served by hostecho.

pub mod echo;
pub mod items;

use axum::Router;
use axum::routing::get;

use crate::store::SharedItemStore;

/// Builds the full router: echo routes plus the `/items` CRUD resource.
///
/// Echo handlers need the [`crate::EchoContext`] extensions that [`crate::serve`] installs;
/// tests can install them with [`crate::runtime::install_extensions`].
pub fn app(store: SharedItemStore) -> Router {
    Router::new()
        .route("/", get(echo::root))
        .route("/items", get(items::list_items).post(items::create_item))
        .route(
            "/items/:id",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        .route("/:param", get(echo::path_param))
        .route("/:param/query", get(echo::path_param))
        .with_state(store)
}
