use std::sync::Arc;

use actix::Actor;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use dotenv::dotenv;
use env_logger::Env;
use log::{info, warn};
use serde_json::json;

use forum_backend::app::ForumServices;
use forum_backend::counters::{CounterProjector, Reconciler, spawn_reconciler};
use forum_backend::database::redis::{RedisService, connect_to_redis};
use forum_backend::database::{ForumStore, MemoryStore, MongoStore, connect_to_mongo};
use forum_backend::media::cloudinary::CloudinaryMedia;
use forum_backend::media::{DisabledMedia, MediaStore};
use forum_backend::middleware::error_handler::{handle_error, not_found};
use forum_backend::realtime::{FanoutNotifier, HubNotifier, Notifier, RedisNotifier, TopicHub};
use forum_backend::router::routes;
use forum_backend::utils::config::{AppConfig, StoreBackend};

#[get("/")]
async fn default(config: web::Data<AppConfig>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Forum backend is running",
        "httpStatusCode": StatusCode::OK.as_u16(),
        "service": config.service_name,
    }))
}

fn io_error(message: String) -> std::io::Error {
    std::io::Error::other(message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(io_error)?;

    let store: Arc<dyn ForumStore> = match config.store_backend {
        StoreBackend::Mongo => {
            let client = connect_to_mongo(&config.mongodb_uri, &config.service_name)
                .await
                .map_err(|e| io_error(format!("Failed to connect to MongoDB: {}", e)))?;
            let mongo = MongoStore::new(&client, &config.mongodb_database);
            mongo
                .ensure_indexes()
                .await
                .map_err(|e| io_error(format!("Failed to create indexes: {}", e)))?;
            Arc::new(mongo)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store, nothing will survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let redis = match &config.redis_url {
        Some(url) => match connect_to_redis(url).await {
            Ok(client) => Some(web::Data::new(RedisService::new(&client))),
            Err(e) => {
                warn!("Redis unavailable, continuing without it: {}", e);
                None
            }
        },
        None => None,
    };

    let hub = TopicHub::new().start();

    let mut fanout = FanoutNotifier::new().with(Arc::new(HubNotifier::new(hub.clone())));
    if let Some(redis) = &redis {
        fanout = fanout.with(Arc::new(RedisNotifier::new(redis.get_ref().clone())));
    }
    let notifier: Arc<dyn Notifier> = Arc::new(fanout);

    let media: Arc<dyn MediaStore> = match config.cloudinary.clone() {
        Some(cloudinary) => Arc::new(CloudinaryMedia::new(cloudinary)),
        None => {
            info!("Cloudinary is not configured, media deletion is disabled");
            Arc::new(DisabledMedia)
        }
    };

    let projector = Arc::new(CounterProjector::new(
        store.clone(),
        config.reconcile_failure_threshold,
    ));
    spawn_reconciler(
        Arc::new(Reconciler::new(store.clone())),
        config.reconcile_interval,
        projector.reconcile_signal(),
    );

    let services = ForumServices::new(store, notifier, media, projector);
    let bind = (config.host.clone(), config.port);
    let config = web::Data::new(config);
    let hub = web::Data::new(hub);

    info!("Starting server on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let redis = redis.clone();
        App::new()
            .wrap(Logger::default())
            .app_data(config.clone())
            .app_data(hub.clone())
            .configure(|cfg| {
                if let Some(redis) = redis {
                    cfg.app_data(redis);
                }
            })
            .configure(|cfg| services.configure(cfg))
            .configure(routes)
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, not_found)
                    .default_handler(handle_error),
            )
            .service(default)
    })
    .bind(bind)?
    .run()
    .await?;

    info!("Server has stopped");

    Ok(())
}
