use crate::errors::{AppError, AppResult};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::warn;
use unic_langid::LanguageIdentifier;

/// Localization manager for the application bot.
///
/// Holds one fluent bundle per supported locale. Lookup walks the fallback
/// chain requested language -> configured default language -> "en"; when no
/// bundle resolves the key, a bracketed key literal is returned so a broken
/// catalog never takes a conversation down.
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
    default_lang: String,
}

impl LocalizationManager {
    /// Create a new localization manager with the configured default language
    pub fn new(default_lang: &str) -> AppResult<Self> {
        let mut bundles = HashMap::new();

        // Load available locales
        let locales = vec!["en", "ru"];

        for locale_str in locales {
            let locale: LanguageIdentifier = locale_str
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid locale {locale_str}: {e}")))?;
            let bundle = Self::create_bundle(&locale)?;
            bundles.insert(locale_str.to_string(), bundle);
        }

        Ok(Self {
            bundles,
            default_lang: default_lang.to_string(),
        })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(locale: &LanguageIdentifier) -> AppResult<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);

        // Load the main resource file - path relative to Cargo.toml
        let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
        let resource_path = format!("{}/locales/{}/main.ftl", manifest_dir, locale);
        if let Ok(content) = fs::read_to_string(&resource_path) {
            if let Ok(resource) = FluentResource::try_new(content) {
                let _ = bundle.add_resource(resource);
            }
        } else {
            warn!(path = %resource_path, "Locale resource file not found");
        }

        Ok(bundle)
    }

    /// Get a localized message, walking the fallback chain
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&FluentArgs>,
    ) -> String {
        for candidate in self.fallback_chain(language) {
            let Some(bundle) = self.bundles.get(candidate) else {
                continue;
            };
            let Some(msg) = bundle.get_message(key) else {
                continue;
            };
            let Some(pattern) = msg.value() else {
                continue;
            };

            let mut value = String::new();
            let mut errors = vec![];
            let _ = bundle.write_pattern(&mut value, pattern, args, &mut errors);

            // Missing interpolation arguments are not fatal; the pattern is
            // returned with the placeholder literals left in place.
            if !errors.is_empty() {
                warn!(
                    key = %key,
                    language = %candidate,
                    errors = ?errors,
                    "Message formatted with errors"
                );
            }

            return value;
        }

        warn!(key = %key, language = %language, "No translation found for key");
        format!("[{key}]")
    }

    fn fallback_chain<'a>(&'a self, language: &'a str) -> Vec<&'a str> {
        let mut chain = vec![language];
        if self.default_lang != language {
            chain.push(self.default_lang.as_str());
        }
        if language != "en" && self.default_lang != "en" {
            chain.push("en");
        }
        chain
    }

    /// Check if a language is supported
    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// The configured default language
    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }
}

/// Create a shared localization manager
pub fn create_localization_manager(default_lang: &str) -> AppResult<Arc<LocalizationManager>> {
    Ok(Arc::new(LocalizationManager::new(default_lang)?))
}

/// Convenience function to get a localized message in the given language
pub fn t_lang(manager: &LocalizationManager, key: &str, language: &str) -> String {
    manager.get_message_in_language(key, language, None)
}

/// Convenience function to get a localized message with arguments in the given language
pub fn t_args_lang(
    manager: &LocalizationManager,
    key: &str,
    args: &[(&str, String)],
    language: &str,
) -> String {
    let fluent_args = FluentArgs::from_iter(
        args.iter()
            .map(|(k, v)| (*k, FluentValue::from(v.as_str()))),
    );
    manager.get_message_in_language(key, language, Some(&fluent_args))
}

/// Resolve the language for a user session.
///
/// With `override_user_lang` set, the configured default always wins (the
/// operator runs a single-language deployment). Otherwise the Telegram
/// client language is used when a bundle for it exists, falling back to the
/// configured default, then to English.
pub fn resolve_language(
    manager: &LocalizationManager,
    override_user_lang: bool,
    telegram_language_code: Option<&str>,
) -> String {
    if !override_user_lang {
        if let Some(code) = telegram_language_code {
            // Extract language code (e.g., "ru-RU" -> "ru", "en-US" -> "en")
            let lang = code.split('-').next().unwrap_or("en");
            if manager.is_language_supported(lang) {
                return lang.to_string();
            }
        }
    }

    if manager.is_language_supported(manager.default_lang()) {
        manager.default_lang().to_string()
    } else {
        "en".to_string()
    }
}
