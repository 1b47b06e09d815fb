use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use mongodb::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{settings::Settings, store::MongoStore};

mod auth;
mod balance;
mod error;
mod exchange;
mod requests;
mod routes;
mod schemas;
mod settings;
mod split;
mod store;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = Settings::new().expect("failed to load settings");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "opensplit_ledger={level},actix_web={level}",
                level = settings.log.level
            ))
        }))
        .init();

    // `opensplit-ledger issue-token <user>` mints a token for local use.
    let args: Vec<String> = std::env::args().collect();
    if let [_, command, user_id] = args.as_slice() {
        if command == "issue-token" {
            let now = chrono::Utc::now().timestamp();
            println!("{}", auth::issue_token(user_id, &settings.auth.secret, now));
            return Ok(());
        }
    }

    info!(database = %settings.mongodb.database, "connecting to MongoDB");
    let client = Client::with_uri_str(&settings.mongodb.uri)
        .await
        .expect("failed to connect");
    let store = MongoStore::new(&client, &settings.mongodb.database, settings.mongodb.timeout());

    let address = (settings.server.host.clone(), settings.server.port);
    info!(host = %address.0, port = address.1, "listening");
    let settings = web::Data::new(settings);
    let store = web::Data::new(store);

    HttpServer::new(move || {
        let cors = match settings.server.cors_origin.as_str() {
            "*" => Cors::permissive(),
            origin => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .supports_credentials(),
        };
        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(store.clone())
            .app_data(settings.clone())
            .configure(routes::configure)
    })
    .bind(address)?
    .run()
    .await
}
