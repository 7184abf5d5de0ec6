//! Font selection and fit-to-box sizing

use crate::document::{FontHandle, FontResources};
use crate::schema::{ComposeConfig, PixelRect};
use crate::{ComposeError, Result};
use pdf_core::{FontStyle, FontWeight};
use serde::Serialize;
use std::fmt;

/// Upper bound on measurements taken while fitting one element
const MAX_FIT_STEPS: usize = 20;

/// Largest font size accepted from configuration
pub const FONT_SIZE_LIMIT: f32 = 1000.0;

/// A final size within this many points of the floor triggers a warning
const NEAR_FLOOR_POINTS: f32 = 2.0;

/// Below this share of both box dimensions text is flagged as too small
const SMALL_TEXT_RATIO: f64 = 0.3;

/// Something the engine changed on the way from request to mark
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Adjustment {
    FontSizeClamped { requested: f32, applied: f32 },
    FontSizeReduced { from: f32, to: f32 },
    ContentFormatted { from: String, to: String },
    Relocated { from: (f64, f64), to: (f64, f64) },
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjustment::FontSizeClamped { requested, applied } => {
                write!(f, "font size {requested}pt clamped to {applied}pt")
            }
            Adjustment::FontSizeReduced { from, to } => {
                write!(f, "font size reduced from {from}pt to {to}pt to fit")
            }
            Adjustment::ContentFormatted { from, to } => {
                write!(f, "content reformatted from '{from}' to '{to}'")
            }
            Adjustment::Relocated { from, to } => write!(
                f,
                "moved from ({:.1}, {:.1}) to ({:.1}, {:.1}) to avoid overlap",
                from.0, from.1, to.0, to.1
            ),
        }
    }
}

/// Resolved font and measured text for one element on one page
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub font: FontHandle,
    pub font_size: f32,
    pub text_width: f64,
    pub text_height: f64,
}

/// Output of [`StyleResolver::resolve`]
#[derive(Debug, Clone)]
pub struct StyleOutcome {
    pub style: ComputedStyle,
    pub available_width: f64,
    pub available_height: f64,
    /// Whether the text fits the padded box at the resolved size
    pub fits: bool,
    pub adjustments: Vec<Adjustment>,
    pub warnings: Vec<String>,
}

/// Sizing policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleOptions {
    pub min_font_size: f32,
    pub max_font_size: f32,
    pub default_font_size: f32,
    /// Padding per side as a fraction of the box (0.05 = 5%)
    pub padding: f64,
    pub auto_size: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        StyleOptions::from(&ComposeConfig::default())
    }
}

impl From<&ComposeConfig> for StyleOptions {
    fn from(config: &ComposeConfig) -> Self {
        let fallback = ComposeConfig::default();
        let sane = |size: f32, default: f32| {
            if size.is_finite() && size > 0.0 {
                size.min(FONT_SIZE_LIMIT)
            } else {
                default
            }
        };

        let a = sane(config.min_font_size, fallback.min_font_size);
        let b = sane(config.max_font_size, fallback.max_font_size);
        let (min, max) = (a.min(b), a.max(b));
        let padding = config.text_padding_percent / 100.0;

        Self {
            min_font_size: min,
            max_font_size: max,
            default_font_size: sane(config.default_font_size, fallback.default_font_size),
            padding: if padding.is_finite() { padding.clamp(0.0, 0.49) } else { 0.05 },
            auto_size: config.auto_size,
        }
    }
}

/// Picks a font and a size that fits text inside its own box
///
/// It knows nothing about other marks on the page.
#[derive(Debug, Clone, Default)]
pub struct StyleResolver {
    options: StyleOptions,
}

impl StyleResolver {
    pub fn new(options: StyleOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &StyleOptions {
        &self.options
    }

    /// Choose a font: bold upright, then regular upright, then anything
    ///
    /// Within a tier a font whose family matches `family_hint` wins.
    pub fn select_font(&self, fonts: &FontResources, family_hint: Option<&str>) -> Result<FontHandle> {
        let tiers: [&dyn Fn(&FontHandle) -> bool; 3] = [
            &|f| f.weight() == FontWeight::Bold && f.style() == FontStyle::Normal,
            &|f| f.weight() == FontWeight::Regular && f.style() == FontStyle::Normal,
            &|_| true,
        ];

        let matches_hint = |font: &FontHandle| {
            family_hint.is_some_and(|hint| font.family().eq_ignore_ascii_case(hint.trim()))
        };

        for tier in tiers {
            let mut candidates = fonts.iter().filter(|f| tier(*f));
            let first = candidates.next();
            let preferred = first
                .filter(|f| matches_hint(*f))
                .or_else(|| candidates.find(|f| matches_hint(*f)))
                .or(first);
            if let Some(font) = preferred {
                return Ok(font.clone());
            }
        }

        Err(ComposeError::NoFontAvailable)
    }

    /// Resolve font, size and measured extents for `content` in `bounds`
    pub fn resolve(
        &self,
        content: &str,
        requested_font_size: Option<f32>,
        font_family: Option<&str>,
        fonts: &FontResources,
        bounds: &PixelRect,
    ) -> Result<StyleOutcome> {
        let font = self.select_font(fonts, font_family)?;
        let opts = &self.options;

        let requested = requested_font_size
            .filter(|size| size.is_finite() && *size > 0.0)
            .unwrap_or(opts.default_font_size);
        let start = requested.clamp(opts.min_font_size, opts.max_font_size);

        let available_width = bounds.width * (1.0 - 2.0 * opts.padding);
        let available_height = bounds.height * (1.0 - 2.0 * opts.padding);
        let fits = |size: f32| {
            font.text_width(content, size) <= available_width + 1e-9
                && font.text_height(size) <= available_height + 1e-9
        };

        let mut adjustments = Vec::new();
        let mut warnings = Vec::new();

        if start != requested {
            adjustments.push(Adjustment::FontSizeClamped {
                requested,
                applied: start,
            });
        }

        let size = if opts.auto_size {
            self.largest_fitting_size(start, &fits)
        } else {
            start
        };
        let fits_box = fits(size);

        if size != start {
            adjustments.push(Adjustment::FontSizeReduced {
                from: start,
                to: size,
            });
        }

        if !fits_box && opts.auto_size {
            warnings.push(format!(
                "text does not fit its box even at the minimum font size of {}pt",
                opts.min_font_size
            ));
        }
        if size - opts.min_font_size <= NEAR_FLOOR_POINTS {
            warnings.push(format!(
                "font size {size}pt is close to the minimum and may be unreadable"
            ));
        }

        let text_width = font.text_width(content, size);
        let text_height = font.text_height(size);
        if text_width < bounds.width * SMALL_TEXT_RATIO
            && text_height < bounds.height * SMALL_TEXT_RATIO
        {
            warnings.push("text looks too small for its box".to_string());
        }

        log::debug!(
            "resolved font {} at {size}pt (requested {requested}pt) for {:.1}x{:.1} box",
            font.name(),
            bounds.width,
            bounds.height
        );

        Ok(StyleOutcome {
            style: ComputedStyle {
                font,
                font_size: size,
                text_width,
                text_height,
            },
            available_width,
            available_height,
            fits: fits_box,
            adjustments,
            warnings,
        })
    }

    /// Largest size on the 1pt ladder `start, start-1, ...` down to the floor
    /// that fits, or the floor itself when nothing does
    ///
    /// Fit is monotonic in size, so the ladder is bisected instead of walked.
    /// Rungs are computed from their index and the search stops after
    /// `MAX_FIT_STEPS` measurements, keeping the smallest fitting rung seen.
    fn largest_fitting_size(&self, start: f32, fits: &dyn Fn(f32) -> bool) -> f32 {
        let floor = self.options.min_font_size;
        let last = if start > floor {
            (f64::from(start) - f64::from(floor)).ceil() as usize
        } else {
            0
        };
        let rung = |i: usize| {
            if i >= last {
                floor
            } else {
                (f64::from(start) - i as f64) as f32
            }
        };

        if fits(rung(0)) {
            return rung(0);
        }
        if last == 0 || !fits(rung(last)) {
            return floor;
        }

        // rung(lo) never fits, rung(hi) always fits
        let (mut lo, mut hi) = (0, last);
        let mut steps = 2;
        while hi - lo > 1 && steps < MAX_FIT_STEPS {
            let mid = lo + (hi - lo) / 2;
            if fits(rung(mid)) {
                hi = mid;
            } else {
                lo = mid;
            }
            steps += 1;
        }
        rung(hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mono_font, FakeDocument};
    use crate::DocumentHandle;
    use pretty_assertions::assert_eq;

    fn fonts() -> FontResources {
        FakeDocument::a4(1).embedded_fonts()
    }

    fn resolver(auto_size: bool) -> StyleResolver {
        StyleResolver::new(StyleOptions {
            auto_size,
            ..StyleOptions::default()
        })
    }

    #[test]
    fn test_select_font_prefers_bold() {
        let font = resolver(true).select_font(&fonts(), None).unwrap();
        assert_eq!(font.name(), "Mono-Bold");
    }

    #[test]
    fn test_select_font_falls_back_to_regular_then_any() {
        let regular: FontResources = [mono_font("Serif", FontWeight::Regular)].into_iter().collect();
        assert_eq!(resolver(true).select_font(&regular, None).unwrap().name(), "Serif");

        let italic_only: FontResources = [FontHandle::new(
            "Script-Italic",
            "Script",
            FontWeight::Regular,
            FontStyle::Italic,
            std::sync::Arc::new(crate::test_support::MonoMeasure {
                advance: 0.5,
                height: 1.0,
            }),
        )]
        .into_iter()
        .collect();
        assert_eq!(
            resolver(true).select_font(&italic_only, None).unwrap().name(),
            "Script-Italic"
        );
    }

    #[test]
    fn test_select_font_family_hint_within_tier() {
        let fonts: FontResources = [
            mono_font("Sans-Bold", FontWeight::Bold),
            mono_font("Serif-Bold", FontWeight::Bold),
            mono_font("Serif", FontWeight::Regular),
        ]
        .into_iter()
        .collect();

        let font = resolver(true).select_font(&fonts, Some("serif")).unwrap();
        assert_eq!(font.name(), "Serif-Bold");

        // The hint never beats a higher tier
        let fonts: FontResources = [
            mono_font("Sans-Bold", FontWeight::Bold),
            mono_font("Serif", FontWeight::Regular),
        ]
        .into_iter()
        .collect();
        let font = resolver(true).select_font(&fonts, Some("Serif")).unwrap();
        assert_eq!(font.name(), "Sans-Bold");
    }

    #[test]
    fn test_no_font_available() {
        let result = resolver(true).resolve(
            "Jane",
            None,
            None,
            &FontResources::new(),
            &PixelRect::new(0.0, 0.0, 100.0, 100.0),
        );
        assert!(matches!(result, Err(ComposeError::NoFontAvailable)));
    }

    #[test]
    fn test_fits_at_requested_size() {
        // 4 chars * 0.5em * 12pt = 24pt wide, 12pt tall; box 200x100 padded to 180x90
        let outcome = resolver(true)
            .resolve(
                "Jane",
                Some(12.0),
                None,
                &fonts(),
                &PixelRect::new(0.0, 0.0, 200.0, 100.0),
            )
            .unwrap();

        assert_eq!(outcome.style.font_size, 12.0);
        assert_eq!(outcome.style.text_width, 24.0);
        assert_eq!(outcome.style.text_height, 12.0);
        assert!(outcome.fits);
        assert!(outcome.adjustments.is_empty());
        assert_eq!(outcome.warnings, vec!["text looks too small for its box".to_string()]);
    }

    #[test]
    fn test_shrinks_to_largest_fitting_size() {
        // 20 chars need width 10 * size; padded width 90 -> 9pt
        let content = "abcdefghijklmnopqrst";
        let outcome = resolver(true)
            .resolve(
                content,
                Some(30.0),
                None,
                &fonts(),
                &PixelRect::new(0.0, 0.0, 100.0, 100.0),
            )
            .unwrap();

        assert_eq!(outcome.style.font_size, 9.0);
        assert!(outcome.fits);
        assert!(outcome.style.text_width <= outcome.available_width);
        assert!(outcome.style.text_height <= outcome.available_height);
        assert_eq!(
            outcome.adjustments,
            vec![Adjustment::FontSizeReduced { from: 30.0, to: 9.0 }]
        );
        assert!(outcome.warnings.iter().any(|w| w.contains("may be unreadable")));
    }

    #[test]
    fn test_fractional_request_walks_whole_points() {
        // padded width 90, 10 chars -> width 5 * size, fits at <= 18
        let outcome = resolver(true)
            .resolve(
                "abcdefghij",
                Some(20.5),
                None,
                &fonts(),
                &PixelRect::new(0.0, 0.0, 100.0, 100.0),
            )
            .unwrap();
        assert_eq!(outcome.style.font_size, 17.5);
    }

    #[test]
    fn test_floor_returned_with_warning_when_nothing_fits() {
        let content = "x".repeat(200);
        let outcome = resolver(true)
            .resolve(
                &content,
                Some(20.0),
                None,
                &fonts(),
                &PixelRect::new(0.0, 0.0, 100.0, 100.0),
            )
            .unwrap();

        assert_eq!(outcome.style.font_size, 8.0);
        assert!(!outcome.fits);
        assert!(outcome.warnings.iter().any(|w| w.contains("does not fit")));
    }

    #[test]
    fn test_output_always_within_bounds() {
        let big_box = PixelRect::new(0.0, 0.0, 5000.0, 5000.0);
        let outcome = resolver(true)
            .resolve("A", Some(200.0), None, &fonts(), &big_box)
            .unwrap();
        assert_eq!(outcome.style.font_size, 72.0);
        assert_eq!(
            outcome.adjustments,
            vec![Adjustment::FontSizeClamped {
                requested: 200.0,
                applied: 72.0
            }]
        );

        let outcome = resolver(true)
            .resolve("A", Some(1.0), None, &fonts(), &big_box)
            .unwrap();
        assert_eq!(outcome.style.font_size, 8.0);

        let tiny_box = PixelRect::new(0.0, 0.0, 1.0, 1.0);
        for requested in [1.0, 8.0, 12.0, 72.0, 500.0] {
            let outcome = resolver(true)
                .resolve("Jane Doe", Some(requested), None, &fonts(), &tiny_box)
                .unwrap();
            assert!((8.0..=72.0).contains(&outcome.style.font_size));
        }
    }

    #[test]
    fn test_huge_size_range_stays_bounded() {
        let resolver = StyleResolver::new(StyleOptions {
            max_font_size: 1e8,
            ..StyleOptions::default()
        });
        let measured = std::cell::Cell::new(0);
        let font = mono_font("Mono-Bold", FontWeight::Bold);
        let fits = |size: f32| {
            measured.set(measured.get() + 1);
            font.text_width("Jane", size) <= 90.0
        };

        let size = resolver.largest_fitting_size(1e8, &fits);
        assert!(measured.get() <= MAX_FIT_STEPS);
        assert!(fits(size));
        assert!(size >= 8.0);

        let outcome = resolver
            .resolve(
                "Jane",
                Some(1e8),
                None,
                &fonts(),
                &PixelRect::new(0.0, 0.0, 100.0, 100.0),
            )
            .unwrap();
        assert!(outcome.fits);
        assert!((8.0..=45.0).contains(&outcome.style.font_size));
    }

    #[test]
    fn test_config_sizes_are_sanitized() {
        let options = StyleOptions::from(&ComposeConfig {
            min_font_size: f32::NAN,
            max_font_size: 1e8,
            default_font_size: -3.0,
            text_padding_percent: f64::INFINITY,
            ..ComposeConfig::default()
        });
        assert_eq!(options.min_font_size, 8.0);
        assert_eq!(options.max_font_size, FONT_SIZE_LIMIT);
        assert_eq!(options.default_font_size, 12.0);
        assert_eq!(options.padding, 0.05);

        let swapped = StyleOptions::from(&ComposeConfig {
            min_font_size: 40.0,
            max_font_size: 10.0,
            ..ComposeConfig::default()
        });
        assert_eq!((swapped.min_font_size, swapped.max_font_size), (10.0, 40.0));
    }

    #[test]
    fn test_auto_size_disabled_keeps_clamped_size() {
        let outcome = resolver(false)
            .resolve(
                "abcdefghijklmnopqrst",
                Some(30.0),
                None,
                &fonts(),
                &PixelRect::new(0.0, 0.0, 100.0, 100.0),
            )
            .unwrap();
        assert_eq!(outcome.style.font_size, 30.0);
        assert!(!outcome.fits);
        assert!(outcome.adjustments.is_empty());
    }

    #[test]
    fn test_default_size_used_without_request() {
        let outcome = resolver(true)
            .resolve("Jane", None, None, &fonts(), &PixelRect::new(0.0, 0.0, 200.0, 40.0))
            .unwrap();
        assert_eq!(outcome.style.font_size, 12.0);
    }

    #[test]
    fn test_adjustment_messages() {
        assert_eq!(
            Adjustment::FontSizeReduced { from: 30.0, to: 9.0 }.to_string(),
            "font size reduced from 30pt to 9pt to fit"
        );
        assert_eq!(
            Adjustment::Relocated {
                from: (10.0, 10.0),
                to: (65.0, 10.0)
            }
            .to_string(),
            "moved from (10.0, 10.0) to (65.0, 10.0) to avoid overlap"
        );
    }
}
