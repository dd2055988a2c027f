// Feed synthesis - rebuild the podcast RSS document from artifacts on disk
//
// The filesystem is the source of truth for what has been published: every
// rebuild scans the subscription directory, matches audio files back to
// candidate metadata through the title fingerprint, and rewrites the whole
// document. Artifacts whose metadata is no longer resolvable are left out;
// a feed must never point at a file that is not there, and vice versa.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{error, info};
use regex::Regex;
use rss::extension::itunes::{
    ITunesCategoryBuilder, ITunesChannelExtensionBuilder, ITunesItemExtensionBuilder,
};
use rss::extension::{Extension, ExtensionBuilder, ExtensionMap};
use rss::{Channel, ChannelBuilder, EnclosureBuilder, GuidBuilder, Item, ItemBuilder};
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;

use crate::config::Subscription;
use crate::downloader::models::VideoCandidate;
use crate::fingerprint::fingerprint;

pub const FEED_FILE: &str = "feed.xml";

lazy_static! {
    // Only content-addressed audio files count as artifacts
    static ref AUDIO_ARTIFACT_RE: Regex = Regex::new(r"^([0-9a-f]{32})\.mp3$").unwrap();
}

#[derive(Debug)]
pub enum FeedError {
    Io(String),
    Xml(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Feed I/O error: {}", msg),
            Self::Xml(msg) => write!(f, "Feed serialization error: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}

/// Channel-independent settings for feed generation.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Public base URL enclosure links are built from
    pub base_url: String,
    pub language: String,
    pub thumbnail_format: String,
}

/// itunes:duration value: `H:MM:SS` above an hour, `M:SS` below.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Fingerprints of all audio artifacts currently in `dir`.
fn scan_artifacts(dir: &Path) -> HashSet<String> {
    let mut found = HashSet::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = AUDIO_ARTIFACT_RE.captures(name) {
            found.insert(caps[1].to_string());
        }
    }
    found
}

/// Item-level itunes:category is not covered by the typed extension,
/// so it goes through the generic extension map.
fn item_category_extensions(category: &str) -> ExtensionMap {
    let mut attrs = BTreeMap::new();
    attrs.insert("text".to_string(), category.to_string());
    let extension: Extension = ExtensionBuilder::default()
        .name("itunes:category".to_string())
        .attrs(attrs)
        .build();

    let mut map = ExtensionMap::default();
    map.entry("itunes".to_string())
        .or_default()
        .insert("category".to_string(), vec![extension]);
    map
}

pub struct FeedSynthesizer {
    settings: FeedSettings,
}

impl FeedSynthesizer {
    pub fn new(settings: FeedSettings) -> Self {
        Self { settings }
    }

    fn artifact_url(&self, subscription: &Subscription, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            subscription.name,
            file_name
        )
    }

    /// Rebuild the whole feed document for one subscription.
    ///
    /// `known` is every candidate seen this cycle; artifacts on disk whose
    /// fingerprint matches none of them are excluded. `selected` is this
    /// cycle's chosen video, whose thumbnail becomes the channel image.
    pub fn rebuild_feed(
        &self,
        subscription: &Subscription,
        subscription_dir: &Path,
        known: &[VideoCandidate],
        selected: &VideoCandidate,
    ) -> Result<PathBuf, FeedError> {
        std::fs::create_dir_all(subscription_dir).map_err(|e| FeedError::Io(e.to_string()))?;
        let on_disk = scan_artifacts(subscription_dir);

        // Walk candidates in listing order (already newest-first) so item
        // order is stable; each fingerprint is published at most once.
        let mut published = HashSet::new();
        let mut items: Vec<Item> = Vec::new();
        for candidate in known {
            let fp = fingerprint(&candidate.title);
            if !on_disk.contains(&fp) || !published.insert(fp.clone()) {
                continue;
            }
            items.push(self.build_item(subscription, subscription_dir, candidate, &fp));
        }

        let channel = self.build_channel(subscription, selected, items);

        let path = subscription_dir.join(FEED_FILE);
        let tmp = subscription_dir.join(format!("{}.tmp", FEED_FILE));
        let file = std::fs::File::create(&tmp).map_err(|e| FeedError::Io(e.to_string()))?;
        channel
            .pretty_write_to(file, b' ', 2)
            .map_err(|e| FeedError::Xml(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| FeedError::Io(e.to_string()))?;

        info!(
            "[Feed] Rebuilt {} with {} episodes",
            path.display(),
            published.len()
        );
        Ok(path)
    }

    fn build_channel(
        &self,
        subscription: &Subscription,
        selected: &VideoCandidate,
        items: Vec<Item>,
    ) -> Channel {
        let description = if subscription.description.is_empty() {
            format!("Podcast from subscription {}", subscription.name)
        } else {
            subscription.description.clone()
        };
        let author = subscription
            .author
            .clone()
            .unwrap_or_else(|| subscription.name.clone());

        let image_file = format!(
            "{}.{}",
            fingerprint(&selected.title),
            self.settings.thumbnail_format
        );

        let itunes = ITunesChannelExtensionBuilder::default()
            .author(Some(author))
            .summary(Some(description.clone()))
            .categories(vec![ITunesCategoryBuilder::default()
                .text(subscription.category.clone())
                .build()])
            .image(Some(self.artifact_url(subscription, &image_file)))
            .explicit(Some("false".to_string()))
            .r#type(Some("episodic".to_string()))
            .build();

        ChannelBuilder::default()
            .title(subscription.title.clone())
            .link(self.settings.base_url.clone())
            .description(description)
            .language(Some(self.settings.language.clone()))
            .itunes_ext(Some(itunes))
            .items(items)
            .build()
    }

    fn build_item(
        &self,
        subscription: &Subscription,
        subscription_dir: &Path,
        candidate: &VideoCandidate,
        fp: &str,
    ) -> Item {
        let audio_name = format!("{}.mp3", fp);
        let audio_path = subscription_dir.join(&audio_name);
        let length = std::fs::metadata(&audio_path).map(|m| m.len()).unwrap_or(0);

        let description = format!(
            "Episode from subscription {}: {}",
            subscription.name, candidate.title
        );

        // Items are stamped with the rebuild time, not the upload time;
        // the feed advertises when we processed the episode.
        let pub_date = OffsetDateTime::now_utc()
            .format(&Rfc2822)
            .unwrap_or_default();

        let enclosure = EnclosureBuilder::default()
            .url(self.artifact_url(subscription, &audio_name))
            .mime_type("audio/mpeg".to_string())
            .length(length.to_string())
            .build();

        let guid = GuidBuilder::default()
            .value(candidate.watch_url())
            .permalink(true)
            .build();

        let thumb_name = format!("{}.{}", fp, self.settings.thumbnail_format);
        let item_image = subscription_dir
            .join(&thumb_name)
            .exists()
            .then(|| self.artifact_url(subscription, &thumb_name));

        let itunes = ITunesItemExtensionBuilder::default()
            .duration(candidate.duration_seconds.map(format_duration))
            .author(Some(candidate.uploader.clone()))
            .summary(Some(description.clone()))
            .image(item_image)
            .build();

        ItemBuilder::default()
            .title(Some(candidate.title.clone()))
            .description(Some(description))
            .pub_date(Some(pub_date))
            .guid(Some(guid))
            .enclosure(Some(enclosure))
            .itunes_ext(Some(itunes))
            .extensions(item_category_extensions(&subscription.category))
            .build()
    }
}

/// Log a feed synthesis failure loudly; a stale feed silently degrades the
/// one artifact consumers actually see.
pub fn report_feed_failure(subscription: &str, error: &FeedError) {
    error!(
        "[Feed] Could not rebuild feed for subscription '{}': {}",
        subscription, error
    );
}
