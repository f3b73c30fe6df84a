//! The spoofing script injected before any page script runs.
//!
//! Rendered once per fingerprint and installed as a run-on-new-document
//! script, so every navigation in the session presents the same device.

use super::Fingerprint;

/// Script template. Placeholder tokens are substituted with the
/// fingerprint's concrete values; everything else is verbatim JS.
const TEMPLATE: &str = r#"
(function() {
    'use strict';

    const originalToDataURL = HTMLCanvasElement.prototype.toDataURL;
    const originalToBlob = HTMLCanvasElement.prototype.toBlob;
    const originalGetImageData = CanvasRenderingContext2D.prototype.getImageData;

    // --- navigator ---

    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    });

    Object.defineProperty(navigator, 'platform', {
        get: () => '__PLATFORM__'
    });

    Object.defineProperty(navigator, 'hardwareConcurrency', {
        get: () => __HARDWARE_CONCURRENCY__
    });

    Object.defineProperty(navigator, 'deviceMemory', {
        get: () => __DEVICE_MEMORY__
    });

    Object.defineProperty(navigator, 'languages', {
        get: () => __LANGUAGES_JSON__
    });

    Object.defineProperty(navigator, 'language', {
        get: () => '__PRIMARY_LANGUAGE__'
    });

    // --- screen ---

    Object.defineProperty(screen, 'width', { get: () => __SCREEN_WIDTH__ });
    Object.defineProperty(screen, 'height', { get: () => __SCREEN_HEIGHT__ });
    Object.defineProperty(screen, 'availWidth', { get: () => __SCREEN_WIDTH__ });
    Object.defineProperty(screen, 'availHeight', { get: () => __AVAIL_HEIGHT__ });
    Object.defineProperty(screen, 'colorDepth', { get: () => __COLOR_DEPTH__ });
    Object.defineProperty(screen, 'pixelDepth', { get: () => __COLOR_DEPTH__ });
    Object.defineProperty(window, 'devicePixelRatio', { get: () => __PIXEL_RATIO__ });

    // --- timezone ---

    const originalDateTimeFormat = Intl.DateTimeFormat;
    Intl.DateTimeFormat = function(locales, options) {
        options = options || {};
        options.timeZone = options.timeZone || '__TIMEZONE_NAME__';
        return new originalDateTimeFormat(locales, options);
    };
    Intl.DateTimeFormat.prototype = originalDateTimeFormat.prototype;

    Date.prototype.getTimezoneOffset = function() {
        return __TIMEZONE_OFFSET__;
    };

    // --- canvas ---

    const canvasNoise = __CANVAS_NOISE__;

    // Same noise value for the whole session: repeated reads stay
    // consistent with each other but differ from the bare hardware.
    function addCanvasNoise(canvas) {
        const ctx = canvas.getContext('2d');
        if (!ctx) return;

        try {
            const imageData = originalGetImageData.call(ctx, 0, 0, canvas.width, canvas.height);
            const data = imageData.data;

            for (let i = 0; i < data.length; i += 4) {
                if ((i / 4) % 100 === 0) {
                    data[i] = Math.max(0, Math.min(255, data[i] + (canvasNoise * 255)));
                }
            }

            ctx.putImageData(imageData, 0, 0);
        } catch(e) {}
    }

    HTMLCanvasElement.prototype.toDataURL = function(...args) {
        addCanvasNoise(this);
        return originalToDataURL.apply(this, args);
    };

    HTMLCanvasElement.prototype.toBlob = function(...args) {
        addCanvasNoise(this);
        return originalToBlob.apply(this, args);
    };

    // --- webgl ---

    const webglVendor = '__WEBGL_VENDOR__';
    const webglRenderer = '__WEBGL_RENDERER__';

    const getParameterProxy = new Proxy(WebGLRenderingContext.prototype.getParameter, {
        apply: function(target, thisArg, args) {
            const param = args[0];

            // UNMASKED_VENDOR_WEBGL
            if (param === 37445) {
                return webglVendor;
            }
            // UNMASKED_RENDERER_WEBGL
            if (param === 37446) {
                return webglRenderer;
            }

            return Reflect.apply(target, thisArg, args);
        }
    });

    WebGLRenderingContext.prototype.getParameter = getParameterProxy;

    if (typeof WebGL2RenderingContext !== 'undefined') {
        WebGL2RenderingContext.prototype.getParameter = getParameterProxy;
    }

    // --- audio ---

    const audioNoise = __AUDIO_NOISE__;

    if (typeof AudioContext !== 'undefined') {
        const originalCreateAnalyser = AudioContext.prototype.createAnalyser;
        AudioContext.prototype.createAnalyser = function() {
            const analyser = originalCreateAnalyser.apply(this, arguments);
            const originalGetFloatFrequencyData = analyser.getFloatFrequencyData.bind(analyser);

            analyser.getFloatFrequencyData = function(array) {
                originalGetFloatFrequencyData(array);
                for (let i = 0; i < array.length; i++) {
                    array[i] += audioNoise;
                }
            };

            return analyser;
        };
    }

    // --- plugins ---

    Object.defineProperty(navigator, 'plugins', {
        get: () => {
            const plugins = [
                { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
                { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
                { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
            ];
            plugins.length = 3;
            return plugins;
        }
    });

    // --- permissions ---

    const originalQuery = navigator.permissions.query;
    navigator.permissions.query = (parameters) => {
        if (parameters.name === 'notifications') {
            return Promise.resolve({ state: Notification.permission });
        }
        return originalQuery(parameters);
    };

    window.chrome = window.chrome || {};
    window.chrome.runtime = window.chrome.runtime || {};

    // --- automation markers ---

    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;

    const nativeToString = Function.prototype.toString;
    Function.prototype.toString = function() {
        if (this === navigator.permissions.query) {
            return 'function query() { [native code] }';
        }
        return nativeToString.call(this);
    };
})();
"#;

/// Render the injection script for a concrete fingerprint.
pub fn render(fp: &Fingerprint) -> String {
    let languages_json =
        serde_json::to_string(&fp.languages).unwrap_or_else(|_| "[\"en-US\",\"en\"]".to_string());

    TEMPLATE
        .replace("__PLATFORM__", &fp.platform)
        .replace(
            "__HARDWARE_CONCURRENCY__",
            &fp.hardware_concurrency.to_string(),
        )
        .replace("__DEVICE_MEMORY__", &fp.device_memory.to_string())
        .replace("__LANGUAGES_JSON__", &languages_json)
        .replace("__PRIMARY_LANGUAGE__", fp.primary_language())
        .replace("__SCREEN_WIDTH__", &fp.screen_width.to_string())
        .replace("__SCREEN_HEIGHT__", &fp.screen_height.to_string())
        .replace(
            "__AVAIL_HEIGHT__",
            &fp.screen_height.saturating_sub(40).to_string(),
        )
        .replace("__COLOR_DEPTH__", &fp.color_depth.to_string())
        .replace("__PIXEL_RATIO__", &fp.pixel_ratio.to_string())
        .replace("__TIMEZONE_NAME__", fp.timezone_name)
        .replace("__TIMEZONE_OFFSET__", &fp.timezone_offset.to_string())
        .replace("__CANVAS_NOISE__", &format!("{:e}", fp.canvas_noise))
        .replace("__WEBGL_VENDOR__", fp.webgl.vendor)
        .replace("__WEBGL_RENDERER__", fp.webgl.renderer)
        .replace("__AUDIO_NOISE__", &format!("{:e}", fp.audio_noise))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintCatalog;

    #[test]
    fn render_substitutes_all_placeholders() {
        let fp = Fingerprint::generate(&FingerprintCatalog::builtin(), Some(7));
        let script = render(&fp);

        assert!(!script.contains("__"), "unsubstituted placeholder left");
        assert!(script.contains(fp.webgl.renderer));
        assert!(script.contains(fp.timezone_name));
        assert!(script.contains(&fp.screen_width.to_string()));
    }
}
