use std::env;

/// Runtime settings, read from the environment with development defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub github_client_id: String,
    pub github_client_secret: String,
    /// Public base URL of this API, used to build the OAuth callback.
    pub api_url: String,
    /// Frontend origin; also the default post-login redirect.
    pub cors_origin: String,
    pub github_oauth_url: String,
    pub github_api_url: String,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            database_url: var_or("DATABASE_URL", "hive.db"),
            jwt_secret: var_or("JWT_SECRET", "dev-secret-change-me"),
            github_client_id: env::var("GITHUB_CLIENT_ID").unwrap_or_default(),
            github_client_secret: env::var("GITHUB_CLIENT_SECRET").unwrap_or_default(),
            api_url: var_or("API_URL", "http://localhost:8080"),
            cors_origin: var_or("CORS_ORIGIN", "http://localhost:3000"),
            github_oauth_url: var_or("GITHUB_OAUTH_URL", "https://github.com/login/oauth"),
            github_api_url: var_or("GITHUB_API_URL", "https://api.github.com"),
        }
    }

    /// Settings for tests and local tooling: in-memory database, fixed secret.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            database_url: ":memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            github_client_id: "client-id".to_string(),
            github_client_secret: "client-secret".to_string(),
            api_url: "http://localhost:8080".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            github_oauth_url: "https://github.com/login/oauth".to_string(),
            github_api_url: "https://api.github.com".to_string(),
        }
    }
}
