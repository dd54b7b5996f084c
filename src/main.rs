use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use semantic_search::config::Settings;
use semantic_search::error::{form_config, json_config};
use semantic_search::{build_state, configure_routes, init_logging};
use std::io;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging("info", "json");
            error!("Failed to load configuration: {}", e);
            return Err(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging.level, &settings.logging.format);

    info!("Starting semantic search service...");

    let app_state = build_state(&settings).await.map_err(|e| {
        error!("Startup failed: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;

    let database = app_state.database.clone();

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;

    info!("Starting HTTP server on {}:{}", host, port);

    let mut server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(json_config())
            .app_data(form_config())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(configure_routes)
    });

    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    let result = server.bind((host, port))?.run().await;

    info!("Server stopped, closing database");
    database.close().await;

    result
}
