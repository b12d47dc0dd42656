use std::time::Duration;

use chrono::FixedOffset;
use photosheet_core::admission::DEFAULT_RETRY_AFTER;
use photosheet_core::export::{ExportFormat, DEFAULT_DPI};
use photosheet_core::layout::LayoutConfig;
use photosheet_core::rate_limit::{parse_rate_limits, RateWindow};
use photosheet_remote::background_removal::DEFAULT_REMOVE_BG_URL;
use photosheet_remote::enhancement::{EnhanceParams, DEFAULT_MODEL_VERSION, DEFAULT_SCALE};

use crate::session::SessionConfig;

/// Default rate limit windows.
pub const DEFAULT_RATE_LIMITS: &str = "3 per minute; 10 per day";

/// Server configuration loaded from environment variables.
///
/// All fields except the session secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`). Remote stages have
    /// no timeout of their own, so this bounds the whole request.
    pub request_timeout_secs: u64,
    /// Maximum accepted upload body in bytes (default: 20 MiB).
    pub max_upload_bytes: usize,
    /// Session token signing and exemption code.
    pub session: SessionConfig,
    /// Rate limit windows and rejection rendering.
    pub rate_limit: RateLimitConfig,
    /// Remote service credentials. Absent credentials disable the stage.
    pub remote: RemoteConfig,
    /// Default export format and density.
    pub export: ExportConfig,
    /// Server-side layout defaults; upload fields override the photo box,
    /// border, copies and row spacing.
    pub layout: LayoutConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `300`                      |
    /// | `MAX_UPLOAD_BYTES`     | `20971520`                 |
    ///
    /// Session, rate limit, remote, export and layout settings are read by
    /// their own `from_env` constructors.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "20971520".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes,
            session: SessionConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            remote: RemoteConfig::from_env(),
            export: ExportConfig::from_env(),
            layout: layout_from_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Windows every non-exempt request must fit in. Empty disables limiting.
    pub windows: Vec<RateWindow>,
    /// Retry-after used when the counter store cannot give one.
    pub fallback_retry_after: Duration,
    /// Timezone the retry deadline is rendered in.
    pub display_offset: FixedOffset,
    /// Label appended to the rendered deadline.
    pub display_label: String,
    /// Reverse proxies in front of the server that append to
    /// `X-Forwarded-For`. `0` ignores the header and keys on the peer
    /// address.
    pub trusted_proxy_hops: usize,
}

impl RateLimitConfig {
    /// | Env Var                            | Default                    |
    /// |------------------------------------|----------------------------|
    /// | `RATE_LIMITS`                      | `3 per minute; 10 per day` |
    /// | `RATE_LIMIT_FALLBACK_SECS`         | `600`                      |
    /// | `RETRY_DISPLAY_UTC_OFFSET_MINUTES` | `330`                      |
    /// | `RETRY_DISPLAY_TZ_LABEL`           | `IST`                      |
    /// | `TRUSTED_PROXY_HOPS`               | `0`                        |
    pub fn from_env() -> Self {
        let limits =
            std::env::var("RATE_LIMITS").unwrap_or_else(|_| DEFAULT_RATE_LIMITS.into());
        let windows = parse_rate_limits(&limits)
            .unwrap_or_else(|e| panic!("Invalid RATE_LIMITS '{limits}': {e}"));

        let fallback_secs: u64 = std::env::var("RATE_LIMIT_FALLBACK_SECS")
            .unwrap_or_else(|_| DEFAULT_RETRY_AFTER.as_secs().to_string())
            .parse()
            .expect("RATE_LIMIT_FALLBACK_SECS must be a valid u64");

        let offset_minutes: i32 = std::env::var("RETRY_DISPLAY_UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| "330".into())
            .parse()
            .expect("RETRY_DISPLAY_UTC_OFFSET_MINUTES must be a valid i32");
        let display_offset = FixedOffset::east_opt(offset_minutes * 60)
            .expect("RETRY_DISPLAY_UTC_OFFSET_MINUTES must be within +/- 24h");

        let display_label =
            std::env::var("RETRY_DISPLAY_TZ_LABEL").unwrap_or_else(|_| "IST".into());

        let trusted_proxy_hops: usize = std::env::var("TRUSTED_PROXY_HOPS")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .expect("TRUSTED_PROXY_HOPS must be a valid usize");

        Self {
            windows,
            fallback_retry_after: Duration::from_secs(fallback_secs),
            display_offset,
            display_label,
            trusted_proxy_hops,
        }
    }
}

// ---------------------------------------------------------------------------
// Remote services
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RemoveBgSettings {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct EnhanceSettings {
    pub api_url: String,
    pub params: EnhanceParams,
}

#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    pub remove_bg: Option<RemoveBgSettings>,
    pub cloudinary: Option<CloudinarySettings>,
    pub enhance: Option<EnhanceSettings>,
}

impl RemoteConfig {
    /// | Env Var                                                            | Default                                |
    /// |--------------------------------------------------------------------|----------------------------------------|
    /// | `REMOVE_BG_API_KEY`                                                | unset (stage disabled)                 |
    /// | `REMOVE_BG_URL`                                                    | `https://api.remove.bg/v1.0/removebg`  |
    /// | `CLOUDINARY_CLOUD_NAME` / `CLOUDINARY_API_KEY` / `CLOUDINARY_API_SECRET` | unset (stage disabled)           |
    /// | `ENHANCE_URL`                                                      | unset (stage disabled)                 |
    /// | `ENHANCE_MODEL_VERSION`                                            | `v1.4`                                 |
    /// | `ENHANCE_SCALE`                                                    | `2`                                    |
    pub fn from_env() -> Self {
        let remove_bg = non_empty_var("REMOVE_BG_API_KEY").map(|api_key| RemoveBgSettings {
            api_url: non_empty_var("REMOVE_BG_URL")
                .unwrap_or_else(|| DEFAULT_REMOVE_BG_URL.into()),
            api_key,
        });

        let cloudinary = match (
            non_empty_var("CLOUDINARY_CLOUD_NAME"),
            non_empty_var("CLOUDINARY_API_KEY"),
            non_empty_var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinarySettings {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let enhance = non_empty_var("ENHANCE_URL").map(|api_url| {
            let scale: f32 = std::env::var("ENHANCE_SCALE")
                .unwrap_or_else(|_| DEFAULT_SCALE.to_string())
                .parse()
                .expect("ENHANCE_SCALE must be a valid number");
            EnhanceSettings {
                api_url,
                params: EnhanceParams {
                    model_version: non_empty_var("ENHANCE_MODEL_VERSION")
                        .unwrap_or_else(|| DEFAULT_MODEL_VERSION.into()),
                    scale,
                },
            }
        });

        Self {
            remove_bg,
            cloudinary,
            enhance,
        }
    }
}

// ---------------------------------------------------------------------------
// Export and layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub dpi: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Pdf,
            dpi: DEFAULT_DPI,
        }
    }
}

impl ExportConfig {
    /// | Env Var         | Default |
    /// |-----------------|---------|
    /// | `EXPORT_FORMAT` | `pdf`   |
    /// | `EXPORT_DPI`    | `300`   |
    pub fn from_env() -> Self {
        let format = std::env::var("EXPORT_FORMAT")
            .unwrap_or_else(|_| "pdf".into())
            .parse()
            .unwrap_or_else(|e| panic!("Invalid EXPORT_FORMAT: {e}"));

        let dpi: u32 = std::env::var("EXPORT_DPI")
            .unwrap_or_else(|_| DEFAULT_DPI.to_string())
            .parse()
            .expect("EXPORT_DPI must be a valid u32");
        assert!(dpi > 0, "EXPORT_DPI must be greater than 0");

        Self { format, dpi }
    }
}

/// Layout defaults from `PHOTO_WIDTH`, `PHOTO_HEIGHT`, `PHOTO_BORDER`,
/// `ROW_SPACING`, `MARGIN_X`, `MARGIN_Y`, `HORIZONTAL_GAP`, `PAGE_WIDTH` and
/// `PAGE_HEIGHT`, each falling back to [`LayoutConfig::default`].
pub fn layout_from_env() -> LayoutConfig {
    let defaults = LayoutConfig::default();
    let layout = LayoutConfig {
        photo_width: u32_var("PHOTO_WIDTH", defaults.photo_width),
        photo_height: u32_var("PHOTO_HEIGHT", defaults.photo_height),
        border_px: u32_var("PHOTO_BORDER", defaults.border_px),
        copies: defaults.copies,
        spacing_px: u32_var("ROW_SPACING", defaults.spacing_px),
        margin_x: u32_var("MARGIN_X", defaults.margin_x),
        margin_y: u32_var("MARGIN_Y", defaults.margin_y),
        horizontal_gap: u32_var("HORIZONTAL_GAP", defaults.horizontal_gap),
        page_width: u32_var("PAGE_WIDTH", defaults.page_width),
        page_height: u32_var("PAGE_HEIGHT", defaults.page_height),
    };
    if let Err(e) = layout.validate() {
        panic!("Invalid layout configuration: {e}");
    }
    layout
}

fn u32_var(name: &str, default: u32) -> u32 {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u32")),
        Err(_) => default,
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
