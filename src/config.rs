use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub vietqr: VietQrConfig,
    pub identity_service_url: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Cookie carrying the storefront session token.
    pub cookie_name: String,
    /// Separate cookie for `/dashboard` so a staff login never clobbers a
    /// customer session in the same browser.
    pub admin_cookie_name: String,
    pub ttl_days: i64,
}

/// Bank transfer QR rendering. Left unset, checkout simply offers no QR image.
#[derive(Clone, Debug, Default)]
pub struct VietQrConfig {
    pub bank_id: String,
    pub account_no: String,
    pub account_name: String,
    pub template: String,
    pub add_info: String,
}

pub fn load() -> Result<Config> {
    Ok(Config {
        database: DatabaseConfig {
            url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
        },
        server: ServerConfig {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3006"),
        },
        session: SessionConfig {
            cookie_name: env_or("SESSION_COOKIE_NAME", "sessionid"),
            admin_cookie_name: env_or("ADMIN_SESSION_COOKIE_NAME", "admin_sessionid"),
            ttl_days: std::env::var("SESSION_TTL_DAYS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(14),
        },
        vietqr: VietQrConfig {
            bank_id: env_or("VIETQR_BANK_ID", ""),
            account_no: env_or("VIETQR_ACCOUNT_NO", ""),
            account_name: env_or("VIETQR_ACCOUNT_NAME", ""),
            template: env_or("VIETQR_TEMPLATE", "compact2"),
            add_info: env_or("VIETQR_ADD_INFO", ""),
        },
        identity_service_url: env_or(
            "IDENTITY_SERVICE_URL",
            "http://localhost:3000/identity-service",
        ),
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or(default.to_string())
}
