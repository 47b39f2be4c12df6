use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::OAuthConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const FACEBOOK_AUTH_URL: &str = "https://www.facebook.com/v12.0/dialog/oauth";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v12.0/oauth/access_token";
const FACEBOOK_USERINFO_URL: &str = "https://graph.facebook.com/v12.0/me?fields=id,name,email";

/// Supported external identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    /// URL path segment, e.g. `/api/auth/google/callback`.
    pub fn path(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }

    /// Prefix used in placeholder emails when the provider discloses none.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "fb",
        }
    }

    /// Name of the unique constraint on this provider's id column, used to
    /// tell a lost create-or-fetch race apart from an email collision.
    pub fn id_constraint(self) -> &'static str {
        match self {
            Self::Google => "users_google_id_key",
            Self::Facebook => "users_facebook_id_key",
        }
    }
}

/// Normalized identity as attested by a provider. Every provider variant is
/// reduced to this tuple so one resolver code path serves them all.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub provider: Provider,
    pub provider_user_id: String,
    pub display_name: String,
    pub email: Option<String>,
}

impl VerifiedIdentity {
    pub fn placeholder_email(&self) -> String {
        format!(
            "{}-{}@no-email.com",
            self.provider.slug(),
            self.provider_user_id
        )
    }

    /// Canonical email for this identity: the provider-disclosed address
    /// normalized the same way register and login normalize theirs, so the
    /// unique email column can catch collisions across login methods; a
    /// deterministic placeholder when the provider discloses none.
    pub fn canonical_email(&self) -> String {
        match self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            Some(e) => e.to_lowercase(),
            None => self.placeholder_email(),
        }
    }
}

/// What a failed external-user insert means, decided by the violated unique
/// constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertViolation {
    /// This provider's id column: a concurrent first login won the insert,
    /// retry as a lookup.
    LostRace,
    /// The email column: the address belongs to an account with a different
    /// login method.
    EmailTaken,
    /// Anything else is not ours to interpret.
    Other,
}

impl Provider {
    pub fn classify_insert_violation(self, constraint: Option<&str>) -> InsertViolation {
        match constraint {
            Some(c) if c == self.id_constraint() => InsertViolation::LostRace,
            Some("users_email_key") => InsertViolation::EmailTaken,
            _ => InsertViolation::Other,
        }
    }
}

/// Capability that turns a callback authorization code into a verified
/// external identity. Trait object in `AppState` so tests can stub the
/// network edge out entirely.
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    fn authorize_url(&self, provider: Provider) -> String;
    async fn verify_code(&self, provider: Provider, code: &str)
        -> anyhow::Result<VerifiedIdentity>;
}

/// Profile shape shared by the Google and Facebook userinfo endpoints.
#[derive(Debug, Deserialize)]
struct ProviderProfile {
    id: String,
    name: Option<String>,
    email: Option<String>,
}

pub struct OAuthBroker {
    google: BasicClient,
    facebook: BasicClient,
    http: reqwest::Client,
}

fn build_client(
    base_url: &str,
    id: &str,
    secret: &str,
    auth_url: &str,
    token_url: &str,
    provider: Provider,
) -> anyhow::Result<BasicClient> {
    Ok(BasicClient::new(
        ClientId::new(id.to_string()),
        Some(ClientSecret::new(secret.to_string())),
        AuthUrl::new(auth_url.to_string())?,
        Some(TokenUrl::new(token_url.to_string())?),
    )
    .set_redirect_uri(RedirectUrl::new(format!(
        "{}/api/auth/{}/callback",
        base_url.trim_end_matches('/'),
        provider.path()
    ))?))
}

impl OAuthBroker {
    pub fn new(cfg: &OAuthConfig) -> anyhow::Result<Self> {
        let base = &cfg.callback_base_url;
        Ok(Self {
            google: build_client(
                base,
                &cfg.google_client_id,
                &cfg.google_client_secret,
                GOOGLE_AUTH_URL,
                GOOGLE_TOKEN_URL,
                Provider::Google,
            )?,
            facebook: build_client(
                base,
                &cfg.facebook_client_id,
                &cfg.facebook_client_secret,
                FACEBOOK_AUTH_URL,
                FACEBOOK_TOKEN_URL,
                Provider::Facebook,
            )?,
            http: reqwest::Client::new(),
        })
    }

    fn client(&self, provider: Provider) -> &BasicClient {
        match provider {
            Provider::Google => &self.google,
            Provider::Facebook => &self.facebook,
        }
    }

    fn scopes(provider: Provider) -> &'static [&'static str] {
        match provider {
            Provider::Google => &["email", "profile"],
            Provider::Facebook => &["email", "public_profile"],
        }
    }

    fn userinfo_url(provider: Provider) -> &'static str {
        match provider {
            Provider::Google => GOOGLE_USERINFO_URL,
            Provider::Facebook => FACEBOOK_USERINFO_URL,
        }
    }
}

#[async_trait]
impl IdentityBroker for OAuthBroker {
    fn authorize_url(&self, provider: Provider) -> String {
        let mut req = self.client(provider).authorize_url(CsrfToken::new_random);
        for scope in Self::scopes(provider) {
            req = req.add_scope(Scope::new((*scope).to_string()));
        }
        let (url, _csrf) = req.url();
        url.to_string()
    }

    async fn verify_code(
        &self,
        provider: Provider,
        code: &str,
    ) -> anyhow::Result<VerifiedIdentity> {
        let token = self
            .client(provider)
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| anyhow::anyhow!("code exchange failed: {e}"))?;

        let profile: ProviderProfile = self
            .http
            .get(Self::userinfo_url(provider))
            .bearer_auth(token.access_token().secret())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(provider = ?provider, provider_user_id = %profile.id, "provider profile fetched");
        if profile.email.is_none() {
            info!(provider = ?provider, "provider disclosed no email, placeholder will be used");
        }

        let display_name = profile.name.unwrap_or_else(|| profile.id.clone());
        Ok(VerifiedIdentity {
            provider,
            provider_user_id: profile.id,
            display_name,
            email: profile.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_email_is_deterministic_per_provider() {
        let google = VerifiedIdentity {
            provider: Provider::Google,
            provider_user_id: "12345".into(),
            display_name: "Alice".into(),
            email: None,
        };
        assert_eq!(google.placeholder_email(), "google-12345@no-email.com");

        let facebook = VerifiedIdentity {
            provider: Provider::Facebook,
            provider_user_id: "67890".into(),
            display_name: "Bob".into(),
            email: None,
        };
        assert_eq!(facebook.placeholder_email(), "fb-67890@no-email.com");
    }

    #[test]
    fn canonical_email_normalizes_like_the_password_paths() {
        let identity = VerifiedIdentity {
            provider: Provider::Google,
            provider_user_id: "12345".into(),
            display_name: "Alice".into(),
            email: Some("  Alice@X.com ".into()),
        };
        assert_eq!(identity.canonical_email(), "alice@x.com");
    }

    #[test]
    fn canonical_email_falls_back_to_placeholder() {
        let mut identity = VerifiedIdentity {
            provider: Provider::Facebook,
            provider_user_id: "67890".into(),
            display_name: "Bob".into(),
            email: None,
        };
        assert_eq!(identity.canonical_email(), "fb-67890@no-email.com");

        // a blank address from the provider counts as undisclosed
        identity.email = Some("   ".into());
        assert_eq!(identity.canonical_email(), "fb-67890@no-email.com");
    }

    #[test]
    fn insert_violation_on_own_provider_id_is_a_lost_race() {
        assert_eq!(
            Provider::Google.classify_insert_violation(Some("users_google_id_key")),
            InsertViolation::LostRace
        );
        assert_eq!(
            Provider::Facebook.classify_insert_violation(Some("users_facebook_id_key")),
            InsertViolation::LostRace
        );
    }

    #[test]
    fn insert_violation_on_email_is_a_collision_across_login_methods() {
        assert_eq!(
            Provider::Google.classify_insert_violation(Some("users_email_key")),
            InsertViolation::EmailTaken
        );
        assert_eq!(
            Provider::Facebook.classify_insert_violation(Some("users_email_key")),
            InsertViolation::EmailTaken
        );
    }

    #[test]
    fn unrelated_violations_are_not_interpreted() {
        // another provider's column is not this provider's race
        assert_eq!(
            Provider::Google.classify_insert_violation(Some("users_facebook_id_key")),
            InsertViolation::Other
        );
        assert_eq!(
            Provider::Google.classify_insert_violation(None),
            InsertViolation::Other
        );
    }

    #[test]
    fn provider_deserializes_from_path_segment() {
        let p: Provider = serde_json::from_str("\"google\"").unwrap();
        assert_eq!(p, Provider::Google);
        let p: Provider = serde_json::from_str("\"facebook\"").unwrap();
        assert_eq!(p, Provider::Facebook);
        assert!(serde_json::from_str::<Provider>("\"github\"").is_err());
    }

    #[test]
    fn authorize_url_points_at_the_provider() {
        let cfg = OAuthConfig {
            google_client_id: "gid".into(),
            google_client_secret: "gsecret".into(),
            facebook_client_id: "fid".into(),
            facebook_client_secret: "fsecret".into(),
            callback_base_url: "http://localhost:8080".into(),
            frontend_redirect_url: "http://localhost:5173/login-success".into(),
        };
        let broker = OAuthBroker::new(&cfg).expect("broker builds");
        let url = broker.authorize_url(Provider::Google);
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=gid"));
        assert!(url.contains("google%2Fcallback"));
    }
}
