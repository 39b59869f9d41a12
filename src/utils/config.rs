use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

/// Cloudinary credentials, only needed to delete media that posts,
/// comments and communities reference.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub store_backend: StoreBackend,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub reconcile_interval: Duration,
    pub reconcile_failure_threshold: u32,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = get("PORT", "8000")
            .parse::<u16>()
            .map_err(|_| "PORT must be a valid port number")?;

        let store_backend = match get("STORE_BACKEND", "mongo").to_lowercase().as_str() {
            "mongo" | "mongodb" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => return Err(format!("STORE_BACKEND must be mongo or memory, got {}", other)),
        };

        let reconcile_secs = get("RECONCILE_INTERVAL_SECS", "300")
            .parse::<u64>()
            .map_err(|_| "RECONCILE_INTERVAL_SECS must be a number of seconds")?;
        if reconcile_secs == 0 {
            return Err("RECONCILE_INTERVAL_SECS must be greater than zero".to_string());
        }

        let reconcile_failure_threshold = get("RECONCILE_FAILURE_THRESHOLD", "5")
            .parse::<u32>()
            .map_err(|_| "RECONCILE_FAILURE_THRESHOLD must be a positive number")?
            .max(1);

        let cloudinary = match (
            lookup("CLOUDINARY_CLOUD_NAME"),
            lookup("CLOUDINARY_API_KEY"),
            lookup("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Ok(Self {
            host: get("HOST", "localhost"),
            port,
            service_name: get("SERVICE_NAME", "Unknown"),
            mongodb_uri: get("MONGODB_URI", "mongodb://localhost:27017"),
            mongodb_database: get("MONGODB_DATABASE", "forum_db"),
            store_backend,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            jwt_secret: get("JWT_SECRET", "secret"),
            reconcile_interval: Duration::from_secs(reconcile_secs),
            reconcile_failure_threshold,
            cloudinary,
        })
    }
}
