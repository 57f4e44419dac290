use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One typed key stroke, in its printable form (`g`, `<leader>`, `<C-w>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyStroke(pub String);

impl KeyStroke {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reachable next key and the mapping (or nested group) it leads to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub key: String,
    pub description: String,
    /// True when selecting this key opens a further nested set of mappings.
    #[serde(default)]
    pub is_prefix: bool,
}

impl MappingEntry {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            is_prefix: false,
        }
    }

    pub fn prefix(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            is_prefix: true,
            ..Self::new(key, description)
        }
    }
}

/// Order in which entries appear in the hint grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    #[default]
    ByKey,
    ByKeyPrefixFirst,
    ByDescription,
    ByKeyIgnoreCase,
}

impl SortPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ByKey => "by_key",
            Self::ByKeyPrefixFirst => "by_key_prefix_first",
            Self::ByDescription => "by_description",
            Self::ByKeyIgnoreCase => "by_key_ignore_case",
        }
    }

    pub fn compare(self, a: &MappingEntry, b: &MappingEntry) -> Ordering {
        match self {
            Self::ByKey => a.key.cmp(&b.key),
            Self::ByKeyPrefixFirst => b
                .is_prefix
                .cmp(&a.is_prefix)
                .then_with(|| a.key.cmp(&b.key)),
            Self::ByDescription => a.description.cmp(&b.description),
            Self::ByKeyIgnoreCase => compare_ignore_case(&a.key, &b.key),
        }
    }

    /// Stable sort in place.
    pub fn sort(self, entries: &mut [MappingEntry]) {
        entries.sort_by(|a, b| self.compare(a, b));
    }
}

impl fmt::Display for SortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "by_key" => Ok(Self::ByKey),
            "by_key_prefix_first" => Ok(Self::ByKeyPrefixFirst),
            "by_description" => Ok(Self::ByDescription),
            "by_key_ignore_case" => Ok(Self::ByKeyIgnoreCase),
            other => anyhow::bail!("unknown sort order '{}'", other),
        }
    }
}

/// Non-letters first, then letters case-insensitively with lowercase ahead
/// of uppercase for the same letter. Only the first character decides;
/// equal first characters fall back to comparing the whole key.
fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    let (Some(ca), Some(cb)) = (a.chars().next(), b.chars().next()) else {
        return a.cmp(b);
    };

    match (ca.is_ascii_alphabetic(), cb.is_ascii_alphabetic()) {
        (true, true) => ca
            .to_ascii_lowercase()
            .cmp(&cb.to_ascii_lowercase())
            // 'a' > 'A' in ASCII, so reversing puts lowercase first
            .then_with(|| cb.cmp(&ca))
            .then_with(|| a.cmp(b)),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(entries: &[MappingEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    fn entries_from_keys(keys: &[&str]) -> Vec<MappingEntry> {
        keys.iter().map(|k| MappingEntry::new(*k, "")).collect()
    }

    #[test]
    fn by_key_is_lexicographic() {
        let mut entries = entries_from_keys(&["b", "a", "B", "1"]);
        SortPolicy::ByKey.sort(&mut entries);
        assert_eq!(keys(&entries), vec!["1", "B", "a", "b"]);
    }

    #[test]
    fn ignore_case_puts_non_letters_first_and_lowercase_before_uppercase() {
        let mut entries = entries_from_keys(&["b", "A", "1", "B", "a"]);
        SortPolicy::ByKeyIgnoreCase.sort(&mut entries);
        assert_eq!(keys(&entries), vec!["1", "a", "A", "b", "B"]);
    }

    #[test]
    fn ignore_case_compares_non_letters_by_full_key() {
        let mut entries = entries_from_keys(&["<", "2", "10", "z"]);
        SortPolicy::ByKeyIgnoreCase.sort(&mut entries);
        assert_eq!(keys(&entries), vec!["10", "2", "<", "z"]);
    }

    #[test]
    fn ignore_case_same_first_letter_uses_full_key() {
        let mut entries = entries_from_keys(&["gg", "g", "G"]);
        SortPolicy::ByKeyIgnoreCase.sort(&mut entries);
        assert_eq!(keys(&entries), vec!["g", "gg", "G"]);
    }

    #[test]
    fn ignore_case_empty_key_sorts_first() {
        let mut entries = entries_from_keys(&["a", "", "1"]);
        SortPolicy::ByKeyIgnoreCase.sort(&mut entries);
        assert_eq!(keys(&entries), vec!["", "1", "a"]);
    }

    #[test]
    fn prefix_first_puts_groups_ahead_of_commands() {
        let mut entries = vec![
            MappingEntry::new("a", "append"),
            MappingEntry::prefix("b", "buffers"),
            MappingEntry::new("c", "change"),
        ];
        SortPolicy::ByKeyPrefixFirst.sort(&mut entries);
        assert_eq!(keys(&entries), vec!["b", "a", "c"]);
    }

    #[test]
    fn prefix_first_breaks_ties_by_key() {
        let mut entries = vec![
            MappingEntry::prefix("z", "zoom"),
            MappingEntry::new("b", "back"),
            MappingEntry::prefix("g", "goto"),
        ];
        SortPolicy::ByKeyPrefixFirst.sort(&mut entries);
        assert_eq!(keys(&entries), vec!["g", "z", "b"]);
    }

    #[test]
    fn by_description_ignores_keys() {
        let mut entries = vec![
            MappingEntry::new("a", "zap"),
            MappingEntry::new("z", "apply"),
            MappingEntry::new("m", "move"),
        ];
        SortPolicy::ByDescription.sort(&mut entries);
        assert_eq!(keys(&entries), vec!["z", "m", "a"]);
    }

    #[test]
    fn sort_policy_parses_config_spellings() {
        assert_eq!("by_key".parse::<SortPolicy>().unwrap(), SortPolicy::ByKey);
        assert_eq!(
            "BY_KEY_IGNORE_CASE".parse::<SortPolicy>().unwrap(),
            SortPolicy::ByKeyIgnoreCase
        );
        assert!("alphabetical".parse::<SortPolicy>().is_err());
    }

    #[test]
    fn sort_policy_display_matches_parse() {
        for policy in [
            SortPolicy::ByKey,
            SortPolicy::ByKeyPrefixFirst,
            SortPolicy::ByDescription,
            SortPolicy::ByKeyIgnoreCase,
        ] {
            assert_eq!(policy.to_string().parse::<SortPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn mapping_entry_defaults_is_prefix_when_missing() {
        let entry: MappingEntry =
            serde_json::from_str(r#"{"key":"w","description":"write"}"#).unwrap();
        assert!(!entry.is_prefix);
    }
}
