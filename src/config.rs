use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

/// Client credentials for one OAuth provider. Empty strings are accepted so the
/// service can boot without social login configured.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub google_client_id: String,
    pub google_client_secret: String,
    pub facebook_client_id: String,
    pub facebook_client_secret: String,
    /// Base URL this service is reachable at, used to build callback URLs.
    pub callback_base_url: String,
    /// Where the browser is sent after a successful provider login.
    pub frontend_redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub oauth: OAuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        let oauth = OAuthConfig {
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: std::env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            facebook_client_id: std::env::var("FACEBOOK_APP_ID").unwrap_or_default(),
            facebook_client_secret: std::env::var("FACEBOOK_APP_SECRET").unwrap_or_default(),
            callback_base_url: std::env::var("CALLBACK_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            frontend_redirect_url: std::env::var("FRONTEND_REDIRECT_URL")
                .unwrap_or_else(|_| "http://localhost:5173/login-success".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            oauth,
        })
    }
}
