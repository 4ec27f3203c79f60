use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const DEFAULT_WATCH_BASE: &str = "https://www.youtube.com";
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Every failure collapses into one user-facing message; the distinction
/// between "no such video", "no French captions" and a transport error only
/// matters at debug level.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("无法提取字幕，请确认视频有法语字幕 (CC)")]
    Unavailable,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: String,
}

#[derive(Debug, Clone, Copy)]
enum Pick {
    Lang(&'static str),
    Default,
}

/// Pulls French captions for a video by scraping the watch page's caption
/// track list. `base_url` is swappable so tests can stand in for the real
/// site.
#[derive(Clone)]
pub struct TranscriptFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl Default for TranscriptFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptFetcher {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_WATCH_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fallback chain: the `fr` track, then `fr-FR`, then whatever track the
    /// video lists first. First success wins; each miss is only logged.
    pub async fn fetch_french(&self, url: &str) -> Result<String, TranscriptError> {
        let Some(video_id) = extract_video_id(url) else {
            debug!(url, "no video id in URL");
            return Err(TranscriptError::Unavailable);
        };

        let tracks = match self.caption_tracks(&video_id).await {
            Ok(tracks) => tracks,
            Err(error) => {
                debug!(video_id, %error, "watch page fetch failed");
                Vec::new()
            }
        };

        for pick in [Pick::Lang("fr"), Pick::Lang("fr-FR"), Pick::Default] {
            let Some(track) = pick_track(&tracks, pick) else {
                debug!(video_id, ?pick, "no matching caption track");
                continue;
            };
            match self.track_text(&track.base_url).await {
                Ok(text) if !text.is_empty() => return Ok(text),
                Ok(_) => debug!(video_id, ?pick, "caption track was empty"),
                Err(error) => debug!(video_id, ?pick, %error, "caption track fetch failed"),
            }
        }

        Err(TranscriptError::Unavailable)
    }

    async fn caption_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, reqwest::Error> {
        let url = format!(
            "{}/watch?v={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(video_id)
        );
        let html = self.client.get(&url).send().await?.text().await?;
        Ok(parse_caption_tracks(&html))
    }

    async fn track_text(&self, track_url: &str) -> Result<String, reqwest::Error> {
        let xml = self.client.get(track_url).send().await?.text().await?;
        Ok(flatten_timedtext(&xml))
    }
}

fn pick_track<'a>(tracks: &'a [CaptionTrack], pick: Pick) -> Option<&'a CaptionTrack> {
    match pick {
        Pick::Lang(code) => tracks.iter().find(|t| t.language_code == code),
        Pick::Default => tracks.first(),
    }
}

/// The player response embeds the track list as a JSON array behind a
/// `"captionTracks":` key; serde handles the `&` escapes in the URLs.
fn parse_caption_tracks(html: &str) -> Vec<CaptionTrack> {
    let re = Regex::new(r#""captionTracks":(\[.*?\])"#).unwrap();
    re.captures(html)
        .and_then(|caps| serde_json::from_str(caps.get(1)?.as_str()).ok())
        .unwrap_or_default()
}

/// Joins the `<text>` fragments of a timedtext document into one flat string,
/// dropping all timing attributes and inline markup.
fn flatten_timedtext(xml: &str) -> String {
    let fragment = Regex::new(r"(?s)<text[^>]*>(.*?)</text>").unwrap();
    let tag = Regex::new(r"<[^>]+>").unwrap();
    let mut parts = Vec::new();
    for caps in fragment.captures_iter(xml) {
        let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let clean = decode_entities(&tag.replace_all(raw, ""));
        let clean = clean.trim().to_string();
        if !clean.is_empty() {
            parts.push(clean);
        }
    }
    parts.join(" ")
}

pub fn extract_video_id(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if is_video_id(trimmed) {
        return Some(trimmed.to_string());
    }
    for marker in ["youtu.be/", "/embed/", "/shorts/", "/live/"] {
        if let Some(pos) = trimmed.find(marker) {
            if let Some(id) = take_video_id(&trimmed[pos + marker.len()..]) {
                return Some(id);
            }
        }
    }
    if let Some(pos) = trimmed.find("v=") {
        if let Some(id) = take_video_id(&trimmed[pos + 2..]) {
            return Some(id);
        }
    }
    None
}

fn take_video_id(rest: &str) -> Option<String> {
    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    is_video_id(&id).then(|| id)
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Timedtext bodies double-encode entities (`&amp;#39;` for an apostrophe),
/// so decoding runs twice.
fn decode_entities(text: &str) -> String {
    decode_once(&decode_once(text))
}

fn decode_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let decoded = rest
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
