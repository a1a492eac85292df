#[macro_use]
extern crate rocket;

pub mod catchers;
pub mod classifier;
pub mod config;
pub mod db;
pub mod errors;
pub mod incidents;
pub mod models;
pub mod prober;
pub mod routes;
pub mod scheduler;

use std::sync::Arc;

use config::Config;
use db::Store;
use scheduler::Scheduler;

/// Assembles the Rocket instance from an already-connected store,
/// scheduler, and resolved config. Split out from `main` so integration
/// tests can mount the same routes against a test database without going
/// through env parsing. The listen port comes from `app_config.port`,
/// since Rocket's own figment has no way to see it otherwise.
pub fn build_rocket(store: Store, scheduler: Arc<Scheduler>, app_config: Config) -> rocket::Rocket<rocket::Build> {
    let figment = rocket::Config::figment().merge(("port", app_config.port));

    rocket::custom(figment)
        .manage(store)
        .manage(scheduler)
        .manage(app_config)
        .mount(
            "/",
            routes![
                routes::health,
                routes::create_target,
                routes::list_targets,
                routes::delete_target,
                routes::manual_check,
                routes::get_target_history,
                routes::get_target_incidents,
                routes::get_target_reliability,
                routes::dashboard,
            ],
        )
        .register(
            "/",
            catchers![
                catchers::bad_request,
                catchers::not_found,
                catchers::conflict,
                catchers::unprocessable_entity,
                catchers::internal_error,
            ],
        )
}
