//! Synthetic browser fingerprints.
//!
//! A fingerprint is the full set of device attributes a session presents:
//! screen geometry, user agent, timezone, GPU strings, canvas/audio noise.
//! It is generated once per identity from a seed and never mutated, so
//! every observable surface stays self-consistent for the session's life.

mod catalog;
mod inject;

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::info;

pub use catalog::{FingerprintCatalog, TimezoneProfile, WebGlProfile};

use crate::browser::BrowserSession;
use crate::error::SessionError;

/// An immutable set of spoofed device attributes for one session.
///
/// All fields are pure functions of the seed: regenerating with the same
/// seed and catalog yields a bit-identical value.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub seed: u64,
    pub screen_width: u32,
    pub screen_height: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub color_depth: u32,
    pub pixel_ratio: f64,
    pub user_agent: &'static str,
    pub languages: &'static [&'static str],
    pub timezone_name: &'static str,
    pub timezone_offset: i32,
    pub webgl: WebGlProfile,
    pub hardware_concurrency: u32,
    pub device_memory: u32,
    pub platform: String,
    pub canvas_noise: f64,
    pub audio_noise: f64,
    pub canvas_hash: String,
    pub webgl_hash: String,
    pub audio_hash: String,
}

impl Fingerprint {
    /// Generate a fingerprint from the catalog. Without a seed, one is
    /// derived from the current time at millisecond resolution so
    /// back-to-back calls still differ.
    pub fn generate(catalog: &FingerprintCatalog, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });

        let mut rng = StdRng::seed_from_u64(seed);

        let &(screen_width, screen_height) = catalog
            .screen_resolutions
            .choose(&mut rng)
            .unwrap_or(&(1920, 1080));
        let color_depth = *catalog.color_depths.choose(&mut rng).unwrap_or(&24);
        let pixel_ratio = *catalog.pixel_ratios.choose(&mut rng).unwrap_or(&1.0);

        // Window slightly smaller than the screen, like a real
        // non-maximized browser with chrome and a taskbar.
        let window_width = screen_width - rng.random_range(0..=100);
        let window_height = screen_height - rng.random_range(60..=150);

        let user_agent = catalog
            .user_agents
            .choose(&mut rng)
            .copied()
            .unwrap_or("Mozilla/5.0");
        let languages = catalog
            .languages
            .choose(&mut rng)
            .copied()
            .unwrap_or(&["en-US", "en"]);
        let timezone = catalog
            .timezones
            .choose(&mut rng)
            .copied()
            .unwrap_or(TimezoneProfile {
                name: "Europe/London",
                offset_minutes: 0,
            });
        let webgl = catalog
            .webgl_profiles
            .choose(&mut rng)
            .copied()
            .unwrap_or(WebGlProfile {
                vendor: "Google Inc.",
                renderer: "ANGLE",
            });
        let hardware_concurrency = *catalog.hardware_concurrency.choose(&mut rng).unwrap_or(&4);
        let device_memory = *catalog.device_memory.choose(&mut rng).unwrap_or(&8);
        let platform = catalog
            .platforms
            .choose(&mut rng)
            .copied()
            .unwrap_or("Win32")
            .to_string();

        let canvas_noise = rng.random_range(-0.0001..0.0001);
        let audio_noise = rng.random_range(-0.0001..0.0001);

        let base = format!("{}-{}-{}", seed, user_agent, screen_width);
        let canvas_hash = derive_hash("canvas", &base);
        let webgl_hash = derive_hash("webgl", &base);
        let audio_hash = derive_hash("audio", &base);

        Self {
            seed,
            screen_width,
            screen_height,
            window_width,
            window_height,
            color_depth,
            pixel_ratio,
            user_agent,
            languages,
            timezone_name: timezone.name,
            timezone_offset: timezone.offset_minutes,
            webgl,
            hardware_concurrency,
            device_memory,
            platform,
            canvas_noise,
            audio_noise,
            canvas_hash,
            webgl_hash,
            audio_hash,
        }
    }

    /// First entry of the language list.
    pub fn primary_language(&self) -> &'static str {
        self.languages.first().copied().unwrap_or("en-US")
    }

    /// Chrome launch arguments carrying the fingerprint's geometry,
    /// user agent and locale.
    pub fn chrome_args(&self) -> Vec<String> {
        vec![
            format!("--window-size={},{}", self.window_width, self.window_height),
            format!("--user-agent={}", self.user_agent),
            format!("--lang={}", self.primary_language()),
        ]
    }

    /// The spoofing script to run before every page script.
    pub fn injection_script(&self) -> String {
        inject::render(self)
    }

    /// Install the spoofing script on a live session. Browsers re-run
    /// on-new-document hooks for every navigation, so this is called
    /// once per session, not once per page.
    pub async fn apply_to(&self, session: &dyn BrowserSession) -> Result<(), SessionError> {
        session
            .install_on_new_document(&self.injection_script())
            .await
    }

    /// Log a human-readable summary of the chosen attributes.
    pub fn log_summary(&self) {
        info!(
            seed = self.seed,
            screen = %format!("{}x{}", self.screen_width, self.screen_height),
            window = %format!("{}x{}", self.window_width, self.window_height),
            timezone = self.timezone_name,
            language = self.primary_language(),
            webgl_vendor = self.webgl.vendor,
            cores = self.hardware_concurrency,
            memory_gb = self.device_memory,
            canvas_hash = %self.canvas_hash,
            "fingerprint generated"
        );
    }
}

/// 16 hex chars of SHA-256 over a namespaced base string. Stable per
/// session, distinct across the canvas/webgl/audio surfaces.
fn derive_hash(namespace: &str, base: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"-");
    hasher.update(base.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_is_deterministic() {
        let catalog = FingerprintCatalog::builtin();
        let a = Fingerprint::generate(&catalog, Some(42));
        let b = Fingerprint::generate(&catalog, Some(42));
        assert_eq!(a, b);
        assert_eq!(a.canvas_hash, b.canvas_hash);
        assert_eq!(a.webgl_hash, b.webgl_hash);
        assert_eq!(a.audio_hash, b.audio_hash);
    }

    #[test]
    fn distinct_seeds_produce_distinct_fingerprints() {
        let catalog = FingerprintCatalog::builtin();
        let base = Fingerprint::generate(&catalog, Some(1));
        let differing = (2..50u64)
            .map(|s| Fingerprint::generate(&catalog, Some(s)))
            .filter(|fp| *fp != base)
            .count();
        assert!(differing >= 47, "seeds collide far too often");
    }

    #[test]
    fn unseeded_generation_uses_wall_clock() {
        let catalog = FingerprintCatalog::builtin();
        let fp = Fingerprint::generate(&catalog, None);
        assert!(fp.seed > 0);
    }

    #[test]
    fn window_fits_inside_screen() {
        let catalog = FingerprintCatalog::builtin();
        for seed in 0..20 {
            let fp = Fingerprint::generate(&catalog, Some(seed));
            assert!(fp.window_width <= fp.screen_width);
            assert!(fp.window_width >= fp.screen_width - 100);
            assert!(fp.window_height <= fp.screen_height - 60);
            assert!(fp.window_height >= fp.screen_height - 150);
        }
    }

    #[test]
    fn noise_values_are_small() {
        let catalog = FingerprintCatalog::builtin();
        let fp = Fingerprint::generate(&catalog, Some(9));
        assert!(fp.canvas_noise.abs() < 0.0001);
        assert!(fp.audio_noise.abs() < 0.0001);
    }

    #[test]
    fn derived_hashes_are_namespaced() {
        let catalog = FingerprintCatalog::builtin();
        let fp = Fingerprint::generate(&catalog, Some(3));
        assert_eq!(fp.canvas_hash.len(), 16);
        assert_ne!(fp.canvas_hash, fp.webgl_hash);
        assert_ne!(fp.webgl_hash, fp.audio_hash);
    }

    #[test]
    fn chrome_args_carry_geometry_and_agent() {
        let catalog = FingerprintCatalog::builtin();
        let fp = Fingerprint::generate(&catalog, Some(11));
        let args = fp.chrome_args();
        assert!(args[0].starts_with("--window-size="));
        assert!(args[1].contains(fp.user_agent));
        assert!(args[2].starts_with("--lang="));
    }
}
