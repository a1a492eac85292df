use std::sync::Arc;

use pulsewatch::config::Config;
use pulsewatch::db::Store;
use pulsewatch::scheduler::Scheduler;

#[rocket::launch]
async fn rocket() -> _ {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let store = Store::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let scheduler = Arc::new(Scheduler::new(store.clone(), config.monitor_poll_seconds));
    scheduler.start();

    pulsewatch::build_rocket(store, scheduler, config)
}
