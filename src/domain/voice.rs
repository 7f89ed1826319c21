//! Voice selection.
//!
//! Platform voice catalogs differ wildly between operating systems and
//! browsers and often lack a voice for the target language. The resolver
//! walks an ordered rule table and returns the first voice a rule accepts,
//! trading exactness for guaranteed progress. Voices for unrelated languages
//! on the deny-list are skipped by every rule except the very last one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::language::LanguageProfile;

/// Opaque reference to the runtime's voice object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceHandle(pub String);

/// A synthetic voice offered by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub name: String,
    /// Locale tag as reported by the platform, e.g. `ta-IN`.
    pub locale: String,
    pub handle: VoiceHandle,
}

impl VoiceDescriptor {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            handle: VoiceHandle(name.clone()),
            name,
            locale: locale.into(),
        }
    }
}

/// Language-independent part of the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceFallbackPolicy {
    /// Region the deployment serves; its English voices are the first
    /// generic fallback.
    pub home_region: String,
    /// Name fragment identifying voices of the home region.
    pub home_region_name: String,
    /// Widely available language used as an intermediate fallback.
    pub intermediate_locale: String,
    pub intermediate_name: String,
    /// Name fragments of preferred English voices.
    pub english_keywords: Vec<String>,
    pub english_locale: String,
    /// Locale prefixes of languages that must not be picked as a fallback.
    pub denied_locale_prefixes: Vec<String>,
    /// Name fragments of voices that must not be picked as a fallback.
    pub denied_name_markers: Vec<String>,
}

impl Default for VoiceFallbackPolicy {
    fn default() -> Self {
        Self {
            home_region: "IN".to_string(),
            home_region_name: "india".to_string(),
            intermediate_locale: "hi-IN".to_string(),
            intermediate_name: "hindi".to_string(),
            english_keywords: vec![
                "zira".to_string(),
                "david".to_string(),
                "female".to_string(),
            ],
            english_locale: "en-US".to_string(),
            denied_locale_prefixes: vec!["zh".to_string(), "ja".to_string(), "ko".to_string()],
            denied_name_markers: vec![
                "chinese".to_string(),
                "中文".to_string(),
                "japanese".to_string(),
                "korean".to_string(),
            ],
        }
    }
}

/// The rule that produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTier {
    PreferredKeyword,
    ExactLocale,
    LocalePrefix,
    LanguageName,
    RegionalEnglish,
    PreferredVoiceName,
    HomeRegionEnglish,
    IntermediateLanguage,
    PreferredEnglish,
    DefaultEnglish,
    AnyEnglish,
    FirstAllowed,
    FirstAvailable,
}

impl fmt::Display for SelectionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            SelectionTier::PreferredKeyword => "exact locale with preferred keyword",
            SelectionTier::ExactLocale => "exact locale",
            SelectionTier::LocalePrefix => "language prefix",
            SelectionTier::LanguageName => "language name",
            SelectionTier::RegionalEnglish => "regional English",
            SelectionTier::PreferredVoiceName => "configured voice name",
            SelectionTier::HomeRegionEnglish => "home-region English fallback",
            SelectionTier::IntermediateLanguage => "intermediate language fallback",
            SelectionTier::PreferredEnglish => "preferred English fallback",
            SelectionTier::DefaultEnglish => "default English fallback",
            SelectionTier::AnyEnglish => "any English fallback",
            SelectionTier::FirstAllowed => "first allowed voice",
            SelectionTier::FirstAvailable => "first available voice",
        };
        f.write_str(description)
    }
}

/// A resolved voice and the tier that chose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSelection<'v> {
    pub voice: &'v VoiceDescriptor,
    pub tier: SelectionTier,
}

/// Lowercased view of one profile/policy pair, built once per resolve.
struct RuleContext {
    locale: String,
    lang: String,
    region: Option<String>,
    keywords: Vec<String>,
    language_names: Vec<String>,
    preferred_names: Vec<String>,
    home_english_locale: String,
    home_region: String,
    home_region_name: String,
    intermediate_locale: String,
    intermediate_name: String,
    english_keywords: Vec<String>,
    english_locale: String,
    denied_prefixes: Vec<String>,
    denied_markers: Vec<String>,
}

impl RuleContext {
    fn new(profile: &LanguageProfile, policy: &VoiceFallbackPolicy) -> Self {
        let locale = normalize_locale(&profile.speech_locale);
        let (lang, region) = split_locale(&locale);
        Self {
            lang,
            region,
            locale,
            keywords: lowercase_all(&profile.voice_keywords),
            language_names: lowercase_all(&profile.language_names),
            preferred_names: lowercase_all(&profile.preferred_voice_names),
            home_english_locale: format!("en-{}", policy.home_region.to_lowercase()),
            home_region: policy.home_region.to_lowercase(),
            home_region_name: policy.home_region_name.to_lowercase(),
            intermediate_locale: normalize_locale(&policy.intermediate_locale),
            intermediate_name: policy.intermediate_name.to_lowercase(),
            english_keywords: lowercase_all(&policy.english_keywords),
            english_locale: normalize_locale(&policy.english_locale),
            denied_prefixes: lowercase_all(&policy.denied_locale_prefixes),
            denied_markers: lowercase_all(&policy.denied_name_markers),
        }
    }

    /// A voice of an unrelated deny-listed language. The target language
    /// itself is never denied.
    fn is_denied(&self, candidate: &Candidate<'_>) -> bool {
        if candidate.lang == self.lang {
            return false;
        }
        self.denied_prefixes.iter().any(|p| candidate.lang == *p)
            || self.denied_markers.iter().any(|m| candidate.name.contains(m.as_str()))
    }
}

struct Candidate<'v> {
    voice: &'v VoiceDescriptor,
    name: String,
    locale: String,
    lang: String,
}

impl<'v> Candidate<'v> {
    fn new(voice: &'v VoiceDescriptor) -> Self {
        let locale = normalize_locale(&voice.locale);
        let (lang, _) = split_locale(&locale);
        Self {
            voice,
            name: voice.name.to_lowercase(),
            locale,
            lang,
        }
    }

    fn name_contains_any(&self, fragments: &[String]) -> bool {
        fragments
            .iter()
            .any(|f| !f.is_empty() && self.name.contains(f.as_str()))
    }

    fn is_english(&self) -> bool {
        self.lang == "en"
    }
}

type Predicate = fn(&RuleContext, &Candidate<'_>) -> bool;

enum Matcher {
    /// First voice accepted by the predicate.
    Voice(Predicate),
    /// Profile's preferred voice names in list order, each by substring.
    PreferredNames,
}

struct VoiceRule {
    tier: SelectionTier,
    matcher: Matcher,
    allow_denied: bool,
}

const RULES: &[VoiceRule] = &[
    VoiceRule {
        tier: SelectionTier::PreferredKeyword,
        matcher: Matcher::Voice(|ctx, c| c.locale == ctx.locale && c.name_contains_any(&ctx.keywords)),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::ExactLocale,
        matcher: Matcher::Voice(|ctx, c| c.locale == ctx.locale),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::LocalePrefix,
        matcher: Matcher::Voice(|ctx, c| c.lang == ctx.lang),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::LanguageName,
        matcher: Matcher::Voice(|ctx, c| c.name_contains_any(&ctx.language_names)),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::RegionalEnglish,
        matcher: Matcher::Voice(|ctx, c| {
            let Some(region) = ctx.region.as_deref() else {
                return false;
            };
            c.is_english()
                && (c.locale == format!("en-{}", region)
                    || (region == ctx.home_region
                        && !ctx.home_region_name.is_empty()
                        && c.name.contains(ctx.home_region_name.as_str())))
        }),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::PreferredVoiceName,
        matcher: Matcher::PreferredNames,
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::HomeRegionEnglish,
        matcher: Matcher::Voice(|ctx, c| {
            c.locale == ctx.home_english_locale
                || (c.is_english()
                    && !ctx.home_region_name.is_empty()
                    && c.name.contains(ctx.home_region_name.as_str()))
        }),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::IntermediateLanguage,
        matcher: Matcher::Voice(|ctx, c| {
            c.locale == ctx.intermediate_locale
                || (!ctx.intermediate_name.is_empty()
                    && c.name.contains(ctx.intermediate_name.as_str()))
        }),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::PreferredEnglish,
        matcher: Matcher::Voice(|ctx, c| c.is_english() && c.name_contains_any(&ctx.english_keywords)),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::DefaultEnglish,
        matcher: Matcher::Voice(|ctx, c| c.locale == ctx.english_locale),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::AnyEnglish,
        matcher: Matcher::Voice(|_, c| c.is_english()),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::FirstAllowed,
        matcher: Matcher::Voice(|_, _| true),
        allow_denied: false,
    },
    VoiceRule {
        tier: SelectionTier::FirstAvailable,
        matcher: Matcher::Voice(|_, _| true),
        allow_denied: true,
    },
];

/// Picks the best available voice for a language profile.
///
/// Stateless apart from its fallback policy: the same profile and voice list
/// always produce the same selection.
#[derive(Debug, Clone, Default)]
pub struct VoiceResolver {
    policy: VoiceFallbackPolicy,
}

impl VoiceResolver {
    pub fn new(policy: VoiceFallbackPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &VoiceFallbackPolicy {
        &self.policy
    }

    /// Select a voice for `profile` from `voices`.
    ///
    /// Returns `None` only when `voices` is empty.
    pub fn resolve<'v>(
        &self,
        profile: &LanguageProfile,
        voices: &'v [VoiceDescriptor],
    ) -> Option<VoiceSelection<'v>> {
        if voices.is_empty() {
            return None;
        }

        let ctx = RuleContext::new(profile, &self.policy);
        let candidates: Vec<Candidate<'v>> = voices.iter().map(Candidate::new).collect();

        RULES.iter().find_map(|rule| {
            let allowed = |c: &&Candidate<'v>| rule.allow_denied || !ctx.is_denied(c);
            let found = match rule.matcher {
                Matcher::Voice(predicate) => candidates
                    .iter()
                    .filter(allowed)
                    .find(|c| predicate(&ctx, c)),
                Matcher::PreferredNames => ctx.preferred_names.iter().find_map(|wanted| {
                    candidates
                        .iter()
                        .filter(allowed)
                        .find(|c| !wanted.is_empty() && c.name.contains(wanted.as_str()))
                }),
            };
            found.map(|c| VoiceSelection {
                voice: c.voice,
                tier: rule.tier,
            })
        })
    }
}

fn normalize_locale(locale: &str) -> String {
    locale.trim().replace('_', "-").to_lowercase()
}

fn split_locale(locale: &str) -> (String, Option<String>) {
    let mut parts = locale.split('-');
    let lang = parts.next().unwrap_or_default().to_string();
    let region = parts.next().map(str::to_string);
    (lang, region)
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}
