// Configuration - the subscription/source graph plus settings sections,
// loaded from a YAML file
//
// The file is the single source of truth: every management operation
// mutates the in-memory graph and then rewrites the whole file atomically
// (temp + rename). A broken configuration is the one error class allowed
// to be fatal at startup; nothing downstream can run safely without it.

use std::fmt;
use std::path::{Path, PathBuf};

use log::info;
use serde_yaml::{Mapping, Value};

use crate::downloader::models::DownloadOptions;

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_CATEGORY: &str = "News & Politics";
const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 10;
const DEFAULT_LOOK_BACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Channel,
    Playlist,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Playlist => "playlist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "channel" => Some(Self::Channel),
            "playlist" => Some(Self::Playlist),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked channel or playlist. Owned by exactly one subscription.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub enabled: bool,
    pub poll_interval_minutes: u64,
    pub look_back_count: usize,
    pub custom_title: Option<String>,
    pub custom_description: Option<String>,
    pub category: String,
    pub author: Option<String>,
}

/// A named group of sources sharing one output feed.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub name: String,
    pub title: String,
    pub description: String,
    pub enabled: bool,
    pub category: String,
    pub author: Option<String>,
    pub sources: Vec<Source>,
}

impl Subscription {
    pub fn enabled_sources(&self) -> Vec<&Source> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    NotFound(PathBuf),
    Parse(String),
    Io(String),
    DuplicateName(String),
    UnknownName(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(
                f,
                "Configuration file {} not found; copy config.yaml.dist to {} and adjust it",
                path.display(),
                path.display()
            ),
            Self::Parse(msg) => write!(f, "Configuration parse error: {}", msg),
            Self::Io(msg) => write!(f, "Configuration I/O error: {}", msg),
            Self::DuplicateName(name) => write!(f, "'{}' already exists", name),
            Self::UnknownName(name) => write!(f, "'{}' not found", name),
        }
    }
}

impl std::error::Error for ConfigError {}

// Reading helpers over dynamically-shaped YAML mappings. Unknown keys are
// ignored; known keys fall back to defaults when absent or mistyped.

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(&Value::String(key.to_string()))
}

fn str_or<'a>(map: &'a Mapping, key: &str, default: &'a str) -> &'a str {
    get(map, key).and_then(Value::as_str).unwrap_or(default)
}

fn opt_str(map: &Mapping, key: &str) -> Option<String> {
    get(map, key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn bool_or(map: &Mapping, key: &str, default: bool) -> bool {
    get(map, key).and_then(Value::as_bool).unwrap_or(default)
}

fn u64_or(map: &Mapping, key: &str, default: u64) -> u64 {
    get(map, key).and_then(Value::as_u64).unwrap_or(default)
}

fn mapping_of(map: &Mapping, key: &str) -> Mapping {
    get(map, key)
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default()
}

fn insert(map: &mut Mapping, key: &str, value: Value) {
    map.insert(Value::String(key.to_string()), value);
}

fn insert_opt(map: &mut Mapping, key: &str, value: &Option<String>) {
    match value {
        Some(v) => insert(map, key, Value::String(v.clone())),
        None => insert(map, key, Value::Null),
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    subscriptions: Vec<Subscription>,
    global: Mapping,
    download: Mapping,
    rss: Mapping,
    logging: Mapping,
    diagnostics: Mapping,
}

impl ConfigManager {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&text, path)
    }

    /// Parse a full configuration document. Split out from `load` so tests
    /// can exercise the graph without touching the filesystem.
    pub fn parse(text: &str, path: PathBuf) -> Result<Self, ConfigError> {
        let doc: Value =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let root = doc
            .as_mapping()
            .ok_or_else(|| ConfigError::Parse("top level must be a mapping".to_string()))?;

        let global = mapping_of(root, "global");
        let default_interval = u64_or(&global, "check_interval", DEFAULT_CHECK_INTERVAL_MINUTES);
        let default_look_back =
            u64_or(&global, "max_videos", DEFAULT_LOOK_BACK as u64) as usize;

        let mut subscriptions = Vec::new();
        for (sub_name, sub_value) in mapping_of(root, "subscriptions") {
            let name = sub_name
                .as_str()
                .ok_or_else(|| ConfigError::Parse("subscription name must be a string".to_string()))?
                .to_string();
            let sub_map = sub_value.as_mapping().cloned().unwrap_or_default();

            let sub_category = str_or(&sub_map, "category", DEFAULT_CATEGORY).to_string();
            let sub_author = opt_str(&sub_map, "author");

            let mut sources = Vec::new();
            for (source_name, source_value) in mapping_of(&sub_map, "sources") {
                let source_name = source_name
                    .as_str()
                    .ok_or_else(|| {
                        ConfigError::Parse("source name must be a string".to_string())
                    })?
                    .to_string();
                let source_map = source_value.as_mapping().cloned().unwrap_or_default();

                let url = opt_str(&source_map, "url").ok_or_else(|| {
                    ConfigError::Parse(format!("source '{}' is missing a url", source_name))
                })?;
                let kind_str = str_or(&source_map, "type", "channel");
                let kind = SourceKind::parse(kind_str).ok_or_else(|| {
                    ConfigError::Parse(format!(
                        "source '{}' has unknown type '{}'",
                        source_name, kind_str
                    ))
                })?;

                sources.push(Source {
                    name: source_name,
                    url,
                    kind,
                    enabled: bool_or(&source_map, "enabled", true),
                    poll_interval_minutes: u64_or(&source_map, "check_interval", default_interval),
                    look_back_count: u64_or(
                        &source_map,
                        "max_videos",
                        default_look_back as u64,
                    ) as usize,
                    custom_title: opt_str(&source_map, "custom_title"),
                    custom_description: opt_str(&source_map, "custom_description"),
                    category: str_or(&source_map, "category", &sub_category).to_string(),
                    author: opt_str(&source_map, "author").or_else(|| sub_author.clone()),
                });
            }

            let fallback_title = capitalize(&name);
            subscriptions.push(Subscription {
                title: str_or(&sub_map, "title", &fallback_title).to_string(),
                description: str_or(&sub_map, "description", "").to_string(),
                enabled: bool_or(&sub_map, "enabled", true),
                category: sub_category,
                author: sub_author,
                sources,
                name,
            });
        }

        Ok(Self {
            path,
            subscriptions,
            global,
            download: mapping_of(root, "download"),
            rss: mapping_of(root, "rss"),
            logging: mapping_of(root, "logging"),
            diagnostics: mapping_of(root, "diagnostics"),
        })
    }

    /// Serialize the whole graph back to YAML.
    fn to_yaml(&self) -> Result<String, ConfigError> {
        let mut subs = Mapping::new();
        for subscription in &self.subscriptions {
            let mut sub_map = Mapping::new();
            insert(&mut sub_map, "enabled", Value::Bool(subscription.enabled));
            insert(&mut sub_map, "title", Value::String(subscription.title.clone()));
            insert(
                &mut sub_map,
                "description",
                Value::String(subscription.description.clone()),
            );
            insert(
                &mut sub_map,
                "category",
                Value::String(subscription.category.clone()),
            );
            insert_opt(&mut sub_map, "author", &subscription.author);

            let mut sources = Mapping::new();
            for source in &subscription.sources {
                let mut source_map = Mapping::new();
                insert(&mut source_map, "enabled", Value::Bool(source.enabled));
                insert(
                    &mut source_map,
                    "type",
                    Value::String(source.kind.as_str().to_string()),
                );
                insert(&mut source_map, "url", Value::String(source.url.clone()));
                insert_opt(&mut source_map, "custom_title", &source.custom_title);
                insert_opt(
                    &mut source_map,
                    "custom_description",
                    &source.custom_description,
                );
                insert(
                    &mut source_map,
                    "check_interval",
                    Value::Number(source.poll_interval_minutes.into()),
                );
                insert(
                    &mut source_map,
                    "max_videos",
                    Value::Number((source.look_back_count as u64).into()),
                );
                insert(
                    &mut source_map,
                    "category",
                    Value::String(source.category.clone()),
                );
                insert_opt(&mut source_map, "author", &source.author);
                sources.insert(
                    Value::String(source.name.clone()),
                    Value::Mapping(source_map),
                );
            }
            insert(&mut sub_map, "sources", Value::Mapping(sources));
            subs.insert(
                Value::String(subscription.name.clone()),
                Value::Mapping(sub_map),
            );
        }

        let mut root = Mapping::new();
        insert(&mut root, "global", Value::Mapping(self.global.clone()));
        insert(&mut root, "subscriptions", Value::Mapping(subs));
        insert(&mut root, "download", Value::Mapping(self.download.clone()));
        insert(&mut root, "rss", Value::Mapping(self.rss.clone()));
        insert(&mut root, "logging", Value::Mapping(self.logging.clone()));
        insert(
            &mut root,
            "diagnostics",
            Value::Mapping(self.diagnostics.clone()),
        );

        serde_yaml::to_string(&Value::Mapping(root)).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Persist the whole configuration. Written to a temp file next to the
    /// target and renamed over it, so readers never observe a half-written
    /// document.
    pub fn save(&self) -> Result<(), ConfigError> {
        let yaml = self.to_yaml()?;
        let tmp = self.path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| ConfigError::Io(e.to_string()))?;
        info!("[Config] Saved {}", self.path.display());
        Ok(())
    }

    // ---- read accessors ----

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn enabled_subscriptions(&self) -> Vec<&Subscription> {
        self.subscriptions.iter().filter(|s| s.enabled).collect()
    }

    pub fn subscription_by_name(&self, name: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.name == name)
    }

    pub fn source_by_name(&self, name: &str) -> Option<(&Subscription, &Source)> {
        for subscription in &self.subscriptions {
            if let Some(source) = subscription.sources.iter().find(|s| s.name == name) {
                return Some((subscription, source));
            }
        }
        None
    }

    pub fn check_interval_minutes(&self) -> u64 {
        u64_or(&self.global, "check_interval", DEFAULT_CHECK_INTERVAL_MINUTES)
    }

    pub fn base_url(&self) -> String {
        str_or(&self.global, "base_url", "http://localhost").to_string()
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(str_or(&self.global, "output_dir", "data"))
    }

    pub fn language(&self) -> String {
        str_or(&self.rss, "default_language", "ru").to_string()
    }

    pub fn log_level(&self) -> String {
        str_or(&self.logging, "level", "INFO").to_string()
    }

    pub fn diagnostics_enabled(&self) -> bool {
        bool_or(&self.diagnostics, "enabled", true)
    }

    pub fn download_options(&self) -> DownloadOptions {
        let defaults = DownloadOptions::default();
        DownloadOptions {
            format: str_or(&self.download, "format", &defaults.format).to_string(),
            audio_codec: str_or(&self.download, "audio_codec", &defaults.audio_codec).to_string(),
            audio_quality: str_or(&self.download, "audio_quality", &defaults.audio_quality)
                .to_string(),
            thumbnail_format: str_or(
                &self.download,
                "thumbnail_format",
                &defaults.thumbnail_format,
            )
            .to_string(),
            write_subtitles: bool_or(&self.download, "write_subtitles", false),
            write_automatic_subtitles: bool_or(&self.download, "write_automatic_subtitles", false),
        }
    }

    // ---- management operations: each persists the whole file ----

    pub fn add_subscription(&mut self, subscription: Subscription) -> Result<(), ConfigError> {
        if self.subscription_by_name(&subscription.name).is_some() {
            return Err(ConfigError::DuplicateName(subscription.name));
        }
        self.subscriptions.push(subscription);
        self.save()
    }

    pub fn remove_subscription(&mut self, name: &str) -> Result<(), ConfigError> {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.name != name);
        if self.subscriptions.len() == before {
            return Err(ConfigError::UnknownName(name.to_string()));
        }
        self.save()
    }

    pub fn set_subscription_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ConfigError> {
        let subscription = self
            .subscriptions
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| ConfigError::UnknownName(name.to_string()))?;
        subscription.enabled = enabled;
        self.save()
    }

    /// Add a source to the first enabled subscription, creating a default
    /// subscription when none exists.
    pub fn add_source(&mut self, source: Source) -> Result<(), ConfigError> {
        if self.source_by_name(&source.name).is_some() {
            return Err(ConfigError::DuplicateName(source.name));
        }
        if let Some(subscription) = self.subscriptions.iter_mut().find(|s| s.enabled) {
            subscription.sources.push(source);
            return self.save();
        }
        self.subscriptions.push(Subscription {
            name: "default".to_string(),
            title: "Default Subscription".to_string(),
            description: "Default subscription".to_string(),
            enabled: true,
            category: DEFAULT_CATEGORY.to_string(),
            author: None,
            sources: vec![source],
        });
        self.save()
    }

    pub fn remove_source(&mut self, name: &str) -> Result<(), ConfigError> {
        let mut removed = false;
        for subscription in &mut self.subscriptions {
            let before = subscription.sources.len();
            subscription.sources.retain(|s| s.name != name);
            removed |= subscription.sources.len() != before;
        }
        if !removed {
            return Err(ConfigError::UnknownName(name.to_string()));
        }
        self.save()
    }

    pub fn set_source_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ConfigError> {
        for subscription in &mut self.subscriptions {
            if let Some(source) = subscription.sources.iter_mut().find(|s| s.name == name) {
                source.enabled = enabled;
                return self.save();
            }
        }
        Err(ConfigError::UnknownName(name.to_string()))
    }
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
global:
  check_interval: 10
  max_videos: 5
  language: ru
  base_url: http://feeds.example.org
  output_dir: data
subscriptions:
  news_politics:
    enabled: true
    title: "Новости и политика"
    description: "Подкасты о новостях"
    category: "News & Politics"
    sources:
      varlamov:
        type: channel
        url: https://www.youtube.com/@varlamov
        enabled: true
      che_proishodit:
        type: playlist
        url: https://www.youtube.com/playlist?list=PLabc
        enabled: false
        max_videos: 3
        custom_title: "Чё Происходит"
  tech:
    enabled: false
    sources: {}
download:
  format: bestaudio/best
  audio_codec: mp3
  audio_quality: "192"
  thumbnail_format: webp
rss:
  version: "2.0"
  default_language: ru
logging:
  level: INFO
diagnostics:
  enabled: true
"#;

    fn sample() -> ConfigManager {
        ConfigManager::parse(SAMPLE, PathBuf::from("config.yaml")).unwrap()
    }

    #[test]
    fn test_parse_graph() {
        let config = sample();
        assert_eq!(config.subscriptions().len(), 2);

        let news = config.subscription_by_name("news_politics").unwrap();
        assert!(news.enabled);
        assert_eq!(news.title, "Новости и политика");
        assert_eq!(news.sources.len(), 2);

        let varlamov = &news.sources[0];
        assert_eq!(varlamov.name, "varlamov");
        assert_eq!(varlamov.kind, SourceKind::Channel);
        assert!(varlamov.enabled);
        // Inherited from global
        assert_eq!(varlamov.look_back_count, 5);
        assert_eq!(varlamov.poll_interval_minutes, 10);
        // Inherited from subscription
        assert_eq!(varlamov.category, "News & Politics");

        let playlist = &news.sources[1];
        assert_eq!(playlist.kind, SourceKind::Playlist);
        assert!(!playlist.enabled);
        assert_eq!(playlist.look_back_count, 3);
        assert_eq!(playlist.custom_title.as_deref(), Some("Чё Происходит"));
    }

    #[test]
    fn test_enabled_filters() {
        let config = sample();
        let enabled = config.enabled_subscriptions();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "news_politics");
        assert_eq!(enabled[0].enabled_sources().len(), 1);
    }

    #[test]
    fn test_settings_accessors() {
        let config = sample();
        assert_eq!(config.base_url(), "http://feeds.example.org");
        assert_eq!(config.output_dir(), PathBuf::from("data"));
        assert_eq!(config.check_interval_minutes(), 10);
        assert_eq!(config.language(), "ru");
        assert!(config.diagnostics_enabled());

        let options = config.download_options();
        assert_eq!(options.audio_codec, "mp3");
        assert_eq!(options.thumbnail_format, "webp");
        assert!(!options.write_subtitles);
    }

    #[test]
    fn test_subscription_title_defaults_to_capitalized_name() {
        let config = ConfigManager::parse(
            "subscriptions:\n  tech:\n    sources: {}\n",
            PathBuf::from("config.yaml"),
        )
        .unwrap();
        assert_eq!(config.subscription_by_name("tech").unwrap().title, "Tech");
    }

    #[test]
    fn test_missing_url_is_fatal() {
        let text = "subscriptions:\n  s:\n    sources:\n      broken:\n        type: channel\n";
        let err = ConfigManager::parse(text, PathBuf::from("config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_kind_is_fatal() {
        let text = "subscriptions:\n  s:\n    sources:\n      broken:\n        type: livestream\n        url: http://x\n";
        let err = ConfigManager::parse(text, PathBuf::from("config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_round_trip_through_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut config = ConfigManager::load(&path).unwrap();
        config.set_source_enabled("che_proishodit", true).unwrap();
        config.set_subscription_enabled("tech", true).unwrap();

        let reloaded = ConfigManager::load(&path).unwrap();
        let (_, source) = reloaded.source_by_name("che_proishodit").unwrap();
        assert!(source.enabled);
        assert!(reloaded.subscription_by_name("tech").unwrap().enabled);
        // Untouched fields survive the rewrite
        assert_eq!(reloaded.base_url(), "http://feeds.example.org");
        assert_eq!(
            reloaded
                .source_by_name("che_proishodit")
                .unwrap()
                .1
                .custom_title
                .as_deref(),
            Some("Чё Происходит")
        );
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut config = ConfigManager::load(&path).unwrap();
        let duplicate = Source {
            name: "varlamov".to_string(),
            url: "https://www.youtube.com/@varlamov".to_string(),
            kind: SourceKind::Channel,
            enabled: true,
            poll_interval_minutes: 10,
            look_back_count: 5,
            custom_title: None,
            custom_description: None,
            category: DEFAULT_CATEGORY.to_string(),
            author: None,
        };
        assert!(matches!(
            config.add_source(duplicate),
            Err(ConfigError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_remove_unknown_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut config = ConfigManager::load(&path).unwrap();
        assert!(matches!(
            config.remove_source("nope"),
            Err(ConfigError::UnknownName(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigManager::load("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
