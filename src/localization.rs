//! Localization backed by Fluent resource files under `locales/`.
//!
//! One bundle per supported language, loaded once at startup. Lookups fall
//! back to the default language when a language or key is missing; a missing
//! key in every bundle is a configuration defect and is returned as a marker
//! string so it is visible rather than silently empty.

use std::collections::HashMap;
use std::fs;
use std::sync::LazyLock;

use anyhow::Result;
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use tracing::{error, warn};
use unic_langid::LanguageIdentifier;

/// Languages with a `locales/<lang>/main.ftl` resource.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "kz", "ru", "uz", "tr", "ua"];
pub const DEFAULT_LANGUAGE: &str = "en";

/// Localization manager holding one Fluent bundle per language.
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for lang in SUPPORTED_LANGUAGES {
            match Self::create_bundle(lang) {
                Ok(Some(bundle)) => {
                    bundles.insert(lang.to_string(), bundle);
                }
                Ok(None) => warn!(language = lang, "no resource file, language skipped"),
                Err(e) => error!(language = lang, error = %e, "failed to load language bundle"),
            }
        }
        Ok(Self { bundles })
    }

    fn create_bundle(lang: &str) -> Result<Option<FluentBundle<FluentResource>>> {
        let locale: LanguageIdentifier = lang.parse()?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);

        let resource_path = format!("./locales/{lang}/main.ftl");
        let content = match fs::read_to_string(&resource_path) {
            Ok(content) => content,
            Err(_) => return Ok(None),
        };
        match FluentResource::try_new(content) {
            Ok(resource) => {
                let _ = bundle.add_resource(resource);
            }
            Err((_, errors)) => {
                error!(language = lang, ?errors, "fluent resource failed to parse");
                return Ok(None);
            }
        }
        Ok(Some(bundle))
    }

    /// Get a localized message in the requested language, falling back to the
    /// default language for unknown languages or missing keys.
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        if let Some(value) = self.bundles.get(language).and_then(|b| format_in(b, key, args)) {
            return value;
        }
        if language != DEFAULT_LANGUAGE {
            if let Some(value) = self
                .bundles
                .get(DEFAULT_LANGUAGE)
                .and_then(|b| format_in(b, key, args))
            {
                return value;
            }
        }
        error!(key, language, "missing translation key");
        format!("Missing translation: {key}")
    }
}

fn format_in(
    bundle: &FluentBundle<FluentResource>,
    key: &str,
    args: Option<&HashMap<&str, &str>>,
) -> Option<String> {
    let message = bundle.get_message(key)?;
    let pattern = message.value()?;

    let mut value = String::new();
    let mut errors = Vec::new();
    if let Some(args) = args {
        let fluent_args = FluentArgs::from_iter(
            args.iter().map(|(k, v)| (*k, FluentValue::from(*v))),
        );
        let _ = bundle.write_pattern(&mut value, pattern, Some(&fluent_args), &mut errors);
    } else {
        let _ = bundle.write_pattern(&mut value, pattern, None, &mut errors);
    }
    Some(value)
}

static LOCALIZATION: LazyLock<LocalizationManager> = LazyLock::new(|| {
    LocalizationManager::new().expect("failed to initialize localization manager")
});

/// Force the bundles to load; called once at startup so resource problems
/// surface immediately.
pub fn init_localization() {
    LazyLock::force(&LOCALIZATION);
}

/// Get a localized message.
pub fn t_lang(key: &str, language: &str) -> String {
    LOCALIZATION.get_message_in_language(key, language, None)
}

/// Get a localized message with arguments.
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: &str) -> String {
    let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
    LOCALIZATION.get_message_in_language(key, language, Some(&args_map))
}
