pub mod admin;
pub mod auth;
pub mod events;
pub mod notifications;
pub mod tickets;
#[cfg(feature = "analytics")]
pub mod analytics;
#[cfg(feature = "waitlist")]
pub mod waitlist;

use axum::Router;
use std::sync::Arc;

use crate::config::FeatureFlags;

#[cfg_attr(not(any(feature = "analytics", feature = "waitlist")), allow(unused_variables))]
pub fn routes(features: &FeatureFlags) -> Router<Arc<crate::AppState>> {
    #[allow(unused_mut, clippy::let_and_return)]
    let mut router = Router::new()
        .nest("/auth", auth::routes())
        .merge(events::routes())
        .merge(tickets::routes())
        .merge(notifications::routes())
        .merge(admin::routes());

    #[cfg(feature = "analytics")]
    if features.enable_analytics {
        router = router.merge(analytics::routes());
    }
    #[cfg(feature = "waitlist")]
    if features.enable_waitlist {
        router = router.merge(waitlist::routes());
    }

    router
}
