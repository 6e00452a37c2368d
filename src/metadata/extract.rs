//! Link metadata extraction from HTML
//!
//! Pattern-based, no DOM. Looks at `<meta>` tags in any attribute order and
//! the `<title>` element.

use regex::{Captures, Regex};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::MetadataResult;

/// Image used when a page offers none
pub const FALLBACK_IMAGE: &str =
    "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=400&h=200&fit=crop";

pub const FALLBACK_TITLE: &str = "Link Preview";
pub const FALLBACK_SITE: &str = "External Link";

/// Preview card data for a URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMetadata {
    pub title: String,
    pub description: String,
    pub image: String,
    pub site_name: String,
    pub url: String,
}

impl LinkMetadata {
    /// Card shown when the page could not be read
    pub fn fallback(url: &str) -> Self {
        let site_name = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| FALLBACK_SITE.to_string());

        Self {
            title: FALLBACK_TITLE.to_string(),
            description: String::new(),
            image: FALLBACK_IMAGE.to_string(),
            site_name,
            url: url.to_string(),
        }
    }

    pub(crate) fn with_fallback_image(mut self) -> Self {
        if self.image.is_empty() {
            self.image = FALLBACK_IMAGE.to_string();
        }
        self
    }
}

/// Compiled patterns for metadata extraction
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    meta_tag: Regex,
    attribute: Regex,
    title: Regex,
    entity: Regex,
    notion_id: Regex,
}

impl MetadataExtractor {
    pub fn new() -> MetadataResult<Self> {
        Ok(Self {
            meta_tag: Regex::new(r"(?is)<meta\b[^>]*>")?,
            attribute: Regex::new(r#"(?is)([a-z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            title: Regex::new(r"(?is)<title[^>]*>([^<]*)</title>")?,
            entity: Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")?,
            notion_id: Regex::new(r"-[a-f0-9]{32}$")?,
        })
    }

    /// Pull title, description, image and site name out of a page. Only the
    /// image falls back to a default; missing text stays empty.
    pub fn extract(&self, html: &str, page_url: &str) -> LinkMetadata {
        let meta = self.meta_content(html);
        let pick = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| meta.get(*k).filter(|v| !v.trim().is_empty()))
                .map(|v| self.decode_entities(v).trim().to_string())
        };

        let title = pick(&["og:title", "twitter:title"])
            .or_else(|| {
                self.title
                    .captures(html)
                    .map(|c| self.decode_entities(&c[1]).trim().to_string())
            })
            .unwrap_or_default();

        let description =
            pick(&["og:description", "twitter:description", "description"]).unwrap_or_default();

        let image = pick(&["og:image", "twitter:image"])
            .map(|image| resolve(&image, page_url))
            .unwrap_or_default();

        let site_name = pick(&["og:site_name"])
            .or_else(|| Url::parse(page_url).ok()?.host_str().map(str::to_string))
            .unwrap_or_default();

        LinkMetadata {
            title,
            description,
            image,
            site_name,
            url: page_url.to_string(),
        }
        .with_fallback_image()
    }

    /// Title derived from a Notion page slug, e.g.
    /// `/Day-4-Gent-0123...` becomes `Day 4 Gent`
    pub fn notion_title(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        if !parsed.host_str()?.contains("notion.site") {
            return None;
        }

        let slug = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
        let slug = urlencoding::decode(slug)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| slug.to_string());
        let stripped = self.notion_id.replace(&slug, "");

        let title = stripped
            .split('-')
            .filter(|w| !w.is_empty())
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ");

        Some(if title.is_empty() {
            "Notion Page".to_string()
        } else {
            title
        })
    }

    /// Decode named and numeric character references
    pub fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures| {
                let entity = &caps[1];
                let decoded = match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => entity
                        .strip_prefix("#x")
                        .or_else(|| entity.strip_prefix("#X"))
                        .map(|hex| u32::from_str_radix(hex, 16))
                        .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()))
                        .and_then(Result::ok)
                        .and_then(char::from_u32),
                };
                decoded.map_or_else(|| caps[0].to_string(), String::from)
            })
            .into_owned()
    }

    /// `property`/`name` (lowercased) to `content`, first occurrence wins
    fn meta_content<'h>(&self, html: &'h str) -> HashMap<String, &'h str> {
        let mut found = HashMap::new();

        for tag in self.meta_tag.find_iter(html) {
            let mut key = None;
            let mut content = None;

            for attr in self.attribute.captures_iter(tag.as_str()) {
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match attr[1].to_ascii_lowercase().as_str() {
                    "property" | "name" if key.is_none() => key = Some(value.to_ascii_lowercase()),
                    "content" => content = Some(value),
                    _ => {}
                }
            }

            if let (Some(key), Some(content)) = (key, content) {
                found.entry(key).or_insert(content);
            }
        }

        found
    }
}

fn resolve(image: &str, page_url: &str) -> String {
    if image.starts_with("http") {
        return image.to_string();
    }
    Url::parse(page_url)
        .and_then(|base| base.join(image))
        .map(String::from)
        .unwrap_or_else(|_| image.to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One-off extraction with freshly compiled patterns
pub fn extract(html: &str, page_url: &str) -> MetadataResult<LinkMetadata> {
    Ok(MetadataExtractor::new()?.extract(html, page_url))
}
