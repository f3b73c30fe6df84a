//! Catalogs of real-world device attributes that fingerprints draw from.
//!
//! These are immutable configuration data. Generation stays pure: a
//! fingerprint is a function of (catalog, seed) and nothing else, which
//! keeps it reproducible and testable with small synthetic catalogs.

/// A real GPU vendor/renderer pairing as reported by ANGLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebGlProfile {
    pub vendor: &'static str,
    pub renderer: &'static str,
}

/// An IANA timezone with its UTC offset in minutes (JS convention:
/// positive west of UTC, matching `Date.prototype.getTimezoneOffset`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneProfile {
    pub name: &'static str,
    pub offset_minutes: i32,
}

/// Enumerated attribute options a fingerprint is assembled from.
#[derive(Debug, Clone)]
pub struct FingerprintCatalog {
    pub screen_resolutions: &'static [(u32, u32)],
    pub user_agents: &'static [&'static str],
    pub languages: &'static [&'static [&'static str]],
    pub timezones: &'static [TimezoneProfile],
    pub webgl_profiles: &'static [WebGlProfile],
    pub hardware_concurrency: &'static [u32],
    pub device_memory: &'static [u32],
    pub platforms: &'static [&'static str],
    pub color_depths: &'static [u32],
    pub pixel_ratios: &'static [f64],
}

/// Common desktop screen resolutions.
static SCREEN_RESOLUTIONS: &[(u32, u32)] = &[
    (1920, 1080),
    (1366, 768),
    (1536, 864),
    (1440, 900),
    (1280, 720),
    (1600, 900),
    (2560, 1440),
    (1280, 800),
    (1680, 1050),
    (1360, 768),
    (1920, 1200),
    (2560, 1080),
];

/// Windows Chrome user agents across recent stable versions.
static USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 11.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 11.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

static LANGUAGES: &[&[&str]] = &[&["en-US", "en"], &["en-GB", "en"], &["en-IN", "en"]];

static TIMEZONES: &[TimezoneProfile] = &[
    TimezoneProfile {
        name: "Asia/Kolkata",
        offset_minutes: -330,
    },
    TimezoneProfile {
        name: "America/New_York",
        offset_minutes: 300,
    },
    TimezoneProfile {
        name: "America/Los_Angeles",
        offset_minutes: 480,
    },
    TimezoneProfile {
        name: "Europe/London",
        offset_minutes: 0,
    },
];

/// Real GPU combinations observed in the wild, D3D11 ANGLE strings.
static WEBGL_PROFILES: &[WebGlProfile] = &[
    WebGlProfile {
        vendor: "Google Inc. (NVIDIA)",
        renderer: "ANGLE (NVIDIA, NVIDIA GeForce GTX 1650 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    WebGlProfile {
        vendor: "Google Inc. (NVIDIA)",
        renderer: "ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    WebGlProfile {
        vendor: "Google Inc. (Intel)",
        renderer: "ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    WebGlProfile {
        vendor: "Google Inc. (AMD)",
        renderer: "ANGLE (AMD, AMD Radeon RX 580 Series Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    WebGlProfile {
        vendor: "Google Inc. (Intel)",
        renderer: "ANGLE (Intel, Intel(R) Iris(R) Xe Graphics Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    WebGlProfile {
        vendor: "Google Inc. (NVIDIA)",
        renderer: "ANGLE (NVIDIA, NVIDIA GeForce RTX 2070 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
];

static HARDWARE_CONCURRENCY: &[u32] = &[4, 6, 8, 12, 16];

static DEVICE_MEMORY: &[u32] = &[4, 8, 16, 32];

static PLATFORMS: &[&str] = &["Win32"];

static COLOR_DEPTHS: &[u32] = &[24, 32];

static PIXEL_RATIOS: &[f64] = &[1.0, 1.25, 1.5, 2.0];

impl FingerprintCatalog {
    /// The built-in catalog of plausible desktop-Chrome attributes.
    pub fn builtin() -> Self {
        Self {
            screen_resolutions: SCREEN_RESOLUTIONS,
            user_agents: USER_AGENTS,
            languages: LANGUAGES,
            timezones: TIMEZONES,
            webgl_profiles: WEBGL_PROFILES,
            hardware_concurrency: HARDWARE_CONCURRENCY,
            device_memory: DEVICE_MEMORY,
            platforms: PLATFORMS,
            color_depths: COLOR_DEPTHS,
            pixel_ratios: PIXEL_RATIOS,
        }
    }
}

impl Default for FingerprintCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
