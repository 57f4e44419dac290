use crate::layout::LayoutPolicy;
use crate::mapping::SortPolicy;
use crate::surface::Position;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Read-only typed lookups over an external key-value store.
///
/// `None` covers both "unset" and "set, but not of the requested type".
pub trait ConfigProvider: Send + Sync {
    fn get_int(&self, name: &str) -> Option<i64>;
    fn get_string(&self, name: &str) -> Option<String>;
    fn get_bool(&self, name: &str) -> Option<bool>;
}

/// [`ConfigProvider`] backed by a TOML table. Dotted names walk nested
/// tables, so `hint.delay_ms` reads `delay_ms` under `[hint]`.
#[derive(Debug, Default)]
pub struct TableProvider {
    table: RwLock<toml::Table>,
}

impl TableProvider {
    pub fn new(table: toml::Table) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("keyhint")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let table = toml::from_str(contents).context("parsing config TOML")?;
        Ok(Self::new(table))
    }

    /// Set an option at runtime. `value` is parsed as a TOML scalar
    /// (`500`, `true`, `"by_key"`); anything that doesn't parse is kept
    /// as a plain string.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        let value = parse_scalar(value);
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());

        let mut parts: Vec<&str> = name.split('.').collect();
        let leaf = parts.pop().filter(|s| !s.is_empty());
        let Some(leaf) = leaf else {
            anyhow::bail!("empty option name");
        };

        let mut current = &mut *table;
        for part in parts {
            let next = current
                .entry(part.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            current = match next {
                toml::Value::Table(t) => t,
                _ => anyhow::bail!("'{}' in '{}' is not a table", part, name),
            };
        }
        current.insert(leaf.to_string(), value);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<toml::Value> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        let mut parts = name.split('.');
        let mut value = table.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value.clone())
    }
}

impl ConfigProvider for TableProvider {
    fn get_int(&self, name: &str) -> Option<i64> {
        self.lookup(name)?.as_integer()
    }

    fn get_string(&self, name: &str) -> Option<String> {
        match self.lookup(name)? {
            toml::Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        self.lookup(name)?.as_bool()
    }
}

fn parse_scalar(raw: &str) -> toml::Value {
    let raw = raw.trim();
    toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

pub fn resolve_int(provider: &dyn ConfigProvider, name: &str, default: i64) -> i64 {
    provider.get_int(name).unwrap_or_else(|| {
        debug!(key = name, default, "option unset or not an integer, using default");
        default
    })
}

pub fn resolve_bool(provider: &dyn ConfigProvider, name: &str, default: bool) -> bool {
    provider.get_bool(name).unwrap_or_else(|| {
        debug!(key = name, default, "option unset or not a bool, using default");
        default
    })
}

pub fn resolve_string(provider: &dyn ConfigProvider, name: &str, default: &str) -> String {
    provider.get_string(name).unwrap_or_else(|| {
        debug!(key = name, default, "option unset or not a string, using default");
        default.to_string()
    })
}

/// Resolve an enum-like option, falling back on unknown spellings too.
pub fn resolve_parsed<T: FromStr>(provider: &dyn ConfigProvider, name: &str, default: T) -> T {
    let Some(raw) = provider.get_string(name) else {
        return default;
    };
    raw.parse().unwrap_or_else(|_| {
        debug!(key = name, value = %raw, "unrecognized option value, using default");
        default
    })
}

/// Everything resolved once at startup. Not re-read per request.
#[derive(Debug, Clone, PartialEq)]
pub struct HintSettings {
    pub delay: Duration,
    pub sort: SortPolicy,
    pub layout: LayoutPolicy,
    pub position: Position,
    pub background: String,
    pub style: StyleSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleSettings {
    pub key_color: String,
    pub prefix_color: String,
    pub command_color: String,
    pub divider: String,
}

impl HintSettings {
    pub const DEFAULT_DELAY_MS: i64 = 200;
    pub const DEFAULT_MAX_ROWS: i64 = 10;
    pub const DEFAULT_BACKGROUND: &'static str = "#282828";

    pub fn resolve(provider: &dyn ConfigProvider) -> Self {
        let delay_ms = match resolve_int(provider, "hint.delay_ms", Self::DEFAULT_DELAY_MS) {
            ms if ms < 0 => Self::DEFAULT_DELAY_MS,
            ms => ms,
        };
        let max_rows = match resolve_int(provider, "hint.max_rows", Self::DEFAULT_MAX_ROWS) {
            rows if rows < 1 => Self::DEFAULT_MAX_ROWS,
            rows => rows,
        };

        Self {
            delay: Duration::from_millis(delay_ms as u64),
            sort: resolve_parsed(provider, "hint.sort_order", SortPolicy::default()),
            layout: LayoutPolicy {
                max_rows: usize::try_from(max_rows).unwrap_or(usize::MAX),
                include_typed_sequence: resolve_bool(provider, "hint.show_typed_sequence", true),
            },
            position: resolve_parsed(provider, "hint.position", Position::default()),
            background: resolve_string(provider, "style.background", Self::DEFAULT_BACKGROUND),
            style: StyleSettings::resolve(provider),
        }
    }
}

impl Default for HintSettings {
    fn default() -> Self {
        Self::resolve(&TableProvider::default())
    }
}

impl StyleSettings {
    pub fn resolve(provider: &dyn ConfigProvider) -> Self {
        Self {
            key_color: resolve_string(provider, "style.key_color", "#e5c07b"),
            prefix_color: resolve_string(provider, "style.prefix_color", "#c678dd"),
            command_color: resolve_string(provider, "style.command_color", "#88aaff"),
            divider: resolve_string(provider, "style.divider", " → "),
        }
    }
}

impl Default for StyleSettings {
    fn default() -> Self {
        Self::resolve(&TableProvider::default())
    }
}

pub const DEFAULT_TIMEOUTLEN_MS: i64 = 1000;

/// Fade-out for the popup, read fresh on every request. `0` disables fading.
pub fn fade_millis(provider: &dyn ConfigProvider) -> u64 {
    if !resolve_bool(provider, "timeout", true) {
        return 0;
    }
    match resolve_int(provider, "timeoutlen", DEFAULT_TIMEOUTLEN_MS) {
        ms if ms < 0 => DEFAULT_TIMEOUTLEN_MS as u64,
        ms => ms as u64,
    }
}

pub fn socket_path() -> PathBuf {
    // KEYHINT_SOCK overrides for testing.
    if let Ok(path) = std::env::var("KEYHINT_SOCK") {
        return PathBuf::from(path);
    }
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("keyhint.sock")
}
