//! Loader for the archive manifest with YAML + environment overlays.
//!
//! The manifest names the archive root, the request policy, and the two
//! hand-maintained tables the batches walk: `pages` (relative path to source
//! URL) and `translations` (relative path to the line appended to that file).
//!
//! ```yaml
//! base_dir: "~/docs-archive"
//! base_url: "https://code.claude.com"
//! request:
//!   delay_ms: 500
//! fallback_rewrite:
//!   from: "https://code.claude.com/docs/en/"
//!   to: "https://docs.anthropic.com/en/claude-code/"
//! pages:
//!   - path: "docs/en/hooks.txt"
//!     url: "/docs/en/hooks"
//! translations:
//!   - path: "docs/en/hooks.txt"
//!     line: "..."
//! crawl:
//!   start_url: "/docs/en/overview"
//!   dir: "crawl"
//! media:
//!   pages: ["/docs/en/podcast"]
//! ```
//!
//! Precedence: file/inline YAML first, then `DOCARCHIVE__`-prefixed
//! environment variables (`__` separates nesting, e.g.
//! `DOCARCHIVE__REQUEST__DELAY_MS=0`). `${VAR}` placeholders in any string are
//! expanded after merging.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    pub version: Option<String>,
    /// Archive root. `~` is expanded by [`ArchiveConfig::base_dir`].
    pub base_dir: String,
    #[serde(default)]
    pub base_url: Option<Url>,
    #[serde(default)]
    pub request: RequestSettings,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub fallback_rewrite: Option<FallbackRewrite>,
    #[serde(default)]
    pub pages: Vec<PageSpec>,
    #[serde(default)]
    pub translations: Vec<TranslationSpec>,
    /// One-level crawl from a start page; absent means no crawl is configured.
    #[serde(default)]
    pub crawl: Option<CrawlSettings>,
    #[serde(default)]
    pub media: MediaSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause after every page that was actually requested.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub retries: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            retries: 0,
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    /// An existing file strictly larger than this is left alone.
    #[serde(default = "default_min_existing_bytes")]
    pub min_existing_bytes: u64,
    /// Extracted text must have strictly more trimmed characters than this.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_existing_bytes: default_min_existing_bytes(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

/// Derives a fallback URL by swapping a URL prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackRewrite {
    pub from: String,
    pub to: String,
}

impl FallbackRewrite {
    /// ```
    /// use docarchive_config::FallbackRewrite;
    /// use url::Url;
    ///
    /// let rule = FallbackRewrite {
    ///     from: "https://code.example/docs/en/".into(),
    ///     to: "https://docs.example/en/code/".into(),
    /// };
    /// let primary = Url::parse("https://code.example/docs/en/hooks").unwrap();
    /// let fallback = rule.apply(&primary).unwrap();
    /// assert_eq!(fallback.as_str(), "https://docs.example/en/code/hooks");
    ///
    /// let other = Url::parse("https://code.example/").unwrap();
    /// assert!(rule.apply(&other).is_none());
    /// ```
    pub fn apply(&self, primary: &Url) -> Option<Url> {
        let rest = primary.as_str().strip_prefix(self.from.as_str())?;
        if rest.is_empty() {
            return None;
        }
        Url::parse(&format!("{}{}", self.to, rest)).ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageSpec {
    /// Relative destination path under the archive root.
    pub path: String,
    /// Absolute URL, or a path resolved against `base_url`.
    pub url: String,
    /// Explicit fallback; takes precedence over `fallback_rewrite`.
    #[serde(default)]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationSpec {
    pub path: String,
    pub line: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSettings {
    /// Absolute URL, or a path resolved against `base_url`.
    pub start_url: String,
    /// Archive subdirectory the crawled pages are written under.
    #[serde(default = "default_crawl_dir")]
    pub dir: String,
    /// Links whose href contains any of these are not followed.
    #[serde(default = "default_crawl_exclude")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub max_pages: Option<usize>,
}

impl CrawlSettings {
    /// Settings for an ad-hoc crawl with every other field at its default.
    pub fn starting_at(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            dir: default_crawl_dir(),
            exclude: default_crawl_exclude(),
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    /// Pages whose audio and video are downloaded.
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default = "default_media_dir")]
    pub dir: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            dir: default_media_dir(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into()
}
fn default_accept_language() -> String {
    "en-US,en;q=0.9".into()
}
fn default_min_existing_bytes() -> u64 {
    100
}
fn default_min_text_chars() -> usize {
    50
}
fn default_crawl_dir() -> String {
    "crawl".into()
}
fn default_crawl_exclude() -> Vec<String> {
    vec!["download".into(), "api".into(), "release-notes".into()]
}
fn default_media_dir() -> String {
    "media".into()
}

impl ArchiveConfig {
    /// Archive root with `~` expanded.
    pub fn base_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.base_dir).into_owned())
    }

    /// Resolve a page URL: absolute URLs are kept, anything else is joined
    /// onto `base_url`.
    ///
    /// ```
    /// use docarchive_config::ArchiveConfigLoader;
    ///
    /// let cfg = ArchiveConfigLoader::new()
    ///     .with_yaml_str("base_dir: /tmp/a\nbase_url: https://code.example")
    ///     .load()
    ///     .unwrap();
    /// let url = cfg.resolve_url("/docs/en/setup").unwrap();
    /// assert_eq!(url.as_str(), "https://code.example/docs/en/setup");
    /// ```
    pub fn resolve_url(&self, raw: &str) -> Result<Url, ConfigError> {
        if let Ok(abs) = Url::parse(raw) {
            return Ok(abs);
        }
        let base = self.base_url.as_ref().ok_or_else(|| {
            ConfigError::Message(format!("relative url '{raw}' requires base_url"))
        })?;
        base.join(raw)
            .map_err(|e| ConfigError::Message(format!("invalid url '{raw}': {e}")))
    }

    /// Fallback URL for a page, if any.
    pub fn fallback_for(&self, page: &PageSpec, primary: &Url) -> Result<Option<Url>, ConfigError> {
        if let Some(explicit) = &page.fallback {
            return self.resolve_url(explicit).map(Some);
        }
        Ok(self
            .fallback_rewrite
            .as_ref()
            .and_then(|rule| rule.apply(primary)))
    }

    /// Check URLs and destination paths. Pages and translations are not
    /// cross-checked against each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_dir.trim().is_empty() {
            return Err(ConfigError::Message("base_dir must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for page in &self.pages {
            let components = relative_components(&page.path)
                .map_err(|e| ConfigError::Message(format!("pages: {e}")))?;
            if !seen.insert(components.join("/")) {
                return Err(ConfigError::Message(format!(
                    "pages: duplicate path '{}'",
                    page.path
                )));
            }
            let primary = self.resolve_url(&page.url)?;
            self.fallback_for(page, &primary)?;
        }

        for tr in &self.translations {
            relative_components(&tr.path)
                .map_err(|e| ConfigError::Message(format!("translations: {e}")))?;
        }

        if let Some(crawl) = &self.crawl {
            relative_components(&crawl.dir)
                .map_err(|e| ConfigError::Message(format!("crawl.dir: {e}")))?;
            let start = self.resolve_url(&crawl.start_url)?;
            if !matches!(start.scheme(), "http" | "https") {
                return Err(ConfigError::Message(format!(
                    "crawl.start_url '{start}' must be http or https"
                )));
            }
            if crawl.max_pages == Some(0) {
                return Err(ConfigError::Message("crawl.max_pages must be positive".into()));
            }
        }

        relative_components(&self.media.dir)
            .map_err(|e| ConfigError::Message(format!("media.dir: {e}")))?;
        for page in &self.media.pages {
            self.resolve_url(page)?;
        }
        Ok(())
    }
}

/// Split a manifest path into its components. Both `/` and `\` separate
/// segments; empty and `.` segments are dropped.
///
/// ```
/// use docarchive_config::relative_components;
///
/// assert_eq!(relative_components(r"docs\en\mcp.txt").unwrap(), ["docs", "en", "mcp.txt"]);
/// assert!(relative_components("../etc/passwd").is_err());
/// assert!(relative_components("/abs.txt").is_err());
/// ```
pub fn relative_components(path: &str) -> Result<Vec<&str>, String> {
    if path.starts_with(['/', '\\']) || Path::new(path).is_absolute() || has_drive_prefix(path) {
        return Err(format!("path '{path}' must be relative"));
    }
    let mut parts = Vec::new();
    for seg in path.split(['/', '\\']) {
        match seg {
            "" | "." => continue,
            ".." => return Err(format!("path '{path}' must not contain '..'")),
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        return Err(format!("path '{path}' is empty"));
    }
    Ok(parts)
}

fn has_drive_prefix(path: &str) -> bool {
    let b = path.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct ArchiveConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ArchiveConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveConfigLoader {
    /// Start with `DOCARCHIVE__` env overrides; add YAML sources on top.
    ///
    /// ```
    /// use docarchive_config::ArchiveConfigLoader;
    ///
    /// let config = ArchiveConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nbase_dir: /tmp/archive")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert!(config.pages.is_empty());
    /// assert_eq!(config.thresholds.min_existing_bytes, 100);
    /// assert_eq!(config.thresholds.min_text_chars, 50);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix("DOCARCHIVE")
                .separator("__")
                .try_parsing(true),
        );
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder, expand `${VAR}` placeholders, deserialize and
    /// validate.
    ///
    /// ```
    /// use docarchive_config::ArchiveConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCS_HOST", "code.example"); }
    ///
    /// let config = ArchiveConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// base_dir: "/tmp/archive"
    /// pages:
    ///   - path: "docs/en/setup.txt"
    ///     url: "https://${DOCS_HOST}/docs/en/setup"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.pages[0].url, "https://code.example/docs/en/setup");
    ///
    /// unsafe { std::env::remove_var("DOCS_HOST"); }
    /// ```
    pub fn load(self) -> Result<ArchiveConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ArchiveConfig =
            serde_json::from_value(v).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        typed.validate()?;

        Ok(typed)
    }
}
