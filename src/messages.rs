//! Localized plain-text messages returned by the HTTP API.
//!
//! An English catalog is compiled in. A `<language>.json` file in the
//! translations directory, holding an object of id → template, overrides it.
//! Templates use `{Name}` placeholders.
use std::collections::HashMap;
use std::path::Path;

const ENGLISH: &[(&str, &str)] = &[
    ("req_handle_success", "The feed was added and will be polled for new items."),
    ("db_store_error", "Could not save the feed: {Error}"),
    ("invalid_follow_req", "Invalid follow request. Expected {\"url\": string, \"type\": string, \"charset\": string}."),
    ("invalid_unfollow_req", "Invalid unfollow request. Expected {\"url\": string}."),
    ("feed_delete_success", "The feed is no longer being followed."),
    ("feed_delete_err", "Could not remove the feed: {Error}"),
    ("method_not_impl", "That method is not supported on this route."),
    ("invalid_feed_url", "The feed URL was rejected: {Error}"),
    ("publish_success", "Published the feed list and {Count} item lists."),
    ("publish_failed", "Publishing failed: {Error}"),
    ("service_unavailable", "The service is shutting down. Try again later."),
];

/// Message catalog for one language
#[derive(Debug, Clone)]
pub struct Messages {
    language: String,
    catalog: HashMap<String, String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self::english()
    }
}

impl Messages {
    pub fn english() -> Self {
        Self {
            language: "en-us".to_string(),
            catalog: ENGLISH
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
        }
    }

    /// Load the catalog for `language`, layering `<dir>/<language>.json` over
    /// the English defaults. A missing or unreadable file leaves English in place.
    pub fn load(dir: &Path, language: &str) -> Self {
        let mut messages = Self::english();
        messages.language = language.to_string();

        let path = dir.join(format!("{language}.json"));
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if language != "en-us" {
                    tracing::warn!(path = %path.display(), "No translation file, using English messages");
                }
                return messages;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read translation file");
                return messages;
            }
        };

        match serde_json::from_str::<HashMap<String, String>>(&content) {
            Ok(overrides) => {
                tracing::info!(language = %language, entries = overrides.len(), "Loaded translations");
                messages.catalog.extend(overrides);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid translation file, using English messages");
            }
        }
        messages
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Look up a message with no placeholders. Unknown ids come back verbatim.
    pub fn get(&self, id: &str) -> String {
        self.format(id, &[])
    }

    /// Look up a message and substitute `{Name}` placeholders.
    ///
    /// The template is scanned once, so substituted values are never
    /// themselves searched for placeholders. Unknown placeholders stay as written.
    pub fn format(&self, id: &str, args: &[(&str, &str)]) -> String {
        let Some(template) = self.catalog.get(id) else {
            tracing::debug!(id = %id, "Missing message id");
            return id.to_string();
        };

        let mut text = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            text.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let name = &after[..close];
                args.iter()
                    .find(|(arg, _)| *arg == name)
                    .map(|(_, value)| (*value, close))
            });
            match value {
                Some((value, close)) => {
                    text.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    text.push('{');
                    rest = after;
                }
            }
        }
        text.push_str(rest);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_lookup() {
        let m = Messages::english();
        assert_eq!(
            m.get("feed_delete_success"),
            "The feed is no longer being followed."
        );
    }

    #[test]
    fn test_placeholder_substitution() {
        let m = Messages::english();
        assert_eq!(
            m.format("db_store_error", &[("Error", "disk full")]),
            "Could not save the feed: disk full"
        );
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let m = Messages::english();
        assert_eq!(
            m.format("publish_failed", &[("Error", "bad {Count}"), ("Count", "3")]),
            "Publishing failed: bad {Count}"
        );
    }

    #[test]
    fn test_json_braces_in_template_kept() {
        let m = Messages::english();
        assert_eq!(
            m.get("invalid_unfollow_req"),
            "Invalid unfollow request. Expected {\"url\": string}."
        );
    }

    #[test]
    fn test_unknown_id_returned_verbatim() {
        assert_eq!(Messages::english().get("no_such_message"), "no_such_message");
    }

    #[test]
    fn test_translation_file_overrides_english() {
        let dir = std::env::temp_dir().join("feedgate_messages_test_fr");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("fr-fr.json"),
            r#"{"feed_delete_success": "Le flux n'est plus suivi."}"#,
        )
        .unwrap();

        let m = Messages::load(&dir, "fr-fr");
        assert_eq!(m.language(), "fr-fr");
        assert_eq!(m.get("feed_delete_success"), "Le flux n'est plus suivi.");
        // Untranslated ids fall back to English
        assert_eq!(
            m.get("method_not_impl"),
            "That method is not supported on this route."
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_translation_file_uses_english() {
        let m = Messages::load(Path::new("/tmp/feedgate_no_translations"), "de-de");
        assert_eq!(m.get("publish_failed"), "Publishing failed: {Error}");
    }
}
