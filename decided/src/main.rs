#[macro_use]
extern crate rocket;

#[macro_use]
extern crate serde;

mod api;
mod config;
mod db;
mod guards;
mod logging;

#[cfg(test)]
mod tests;

use config::Config;
use db::SqliteStore;
use decide::{AuthorityRef, Decide, HttpAuthority};
use guards::Users;
use rocket::{Build, Rocket};
use std::sync::Arc;

/// Assemble the HTTP server around a service
pub fn server(decide: Decide, users: Users, default_authority: AuthorityRef) -> Rocket<Build> {
    rocket::build()
        .manage(decide)
        .manage(users)
        .manage(default_authority)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init_logging(&config.log_level, config.log_json);

    let store = SqliteStore::connect(&config.db_path).await?;
    tracing::info!(path = %config.db_path, "database ready");

    let users = Users::load(config.users_path.as_deref())?;
    tracing::info!(users = users.len(), "user directory loaded");

    let authority = HttpAuthority::new(config.authority_timeout, config.authority_token.clone())?;
    let decide = Decide::new(Arc::new(store), Arc::new(authority))
        .with_authority_timeout(config.authority_timeout);

    let _rocket = server(decide, users, config.default_authority())
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {}", e))?;

    Ok(())
}
