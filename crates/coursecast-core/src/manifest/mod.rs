//! Manifest loading: lesson id to manifest URL, and HLS playlist parsing

mod hls;
#[cfg(feature = "http")]
mod fetch;

pub use hls::parse_master_playlist;
#[cfg(feature = "http")]
pub use fetch::{ManifestFetcher, ManifestSource};

use crate::{Error, LessonId, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Layout of the manifest endpoint on the platform API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestRoute {
    /// `{base}/api/hls/stream/{lessonId}`
    #[default]
    HlsStream,
    /// `{base}/api/videos/{lessonId}/master.m3u8`
    VideoMaster,
}

impl ManifestRoute {
    /// Path segments for a lesson, relative to the API base
    fn segments<'a>(&self, lesson_id: &'a str) -> Vec<&'a str> {
        match self {
            ManifestRoute::HlsStream => vec!["api", "hls", "stream", lesson_id],
            ManifestRoute::VideoMaster => vec!["api", "videos", lesson_id, "master.m3u8"],
        }
    }
}

impl std::str::FromStr for ManifestRoute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hls-stream" | "hls" => Ok(ManifestRoute::HlsStream),
            "video-master" | "master" => Ok(ManifestRoute::VideoMaster),
            other => Err(Error::InvalidConfig(format!("unknown manifest route '{}'", other))),
        }
    }
}

impl std::fmt::Display for ManifestRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestRoute::HlsStream => write!(f, "hls-stream"),
            ManifestRoute::VideoMaster => write!(f, "video-master"),
        }
    }
}

/// Build the manifest URL for a lesson.
///
/// The lesson id is percent-encoded as a single path segment and any path
/// prefix on `api_base` is preserved.
pub fn manifest_url(api_base: &Url, route: ManifestRoute, lesson_id: &LessonId) -> Result<Url> {
    let mut url = api_base.clone();
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|_| Error::InvalidConfig(format!("API base '{}' cannot carry a path", api_base)))?
        .pop_if_empty()
        .extend(route.segments(lesson_id.as_str()));

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: &str) -> LessonId {
        LessonId::new(id).unwrap()
    }

    #[test]
    fn test_hls_stream_url() {
        let base = Url::parse("http://localhost:5000").unwrap();
        let url = manifest_url(&base, ManifestRoute::HlsStream, &lesson("abc")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/hls/stream/abc");
    }

    #[test]
    fn test_video_master_url() {
        let base = Url::parse("https://cdn.example.com/").unwrap();
        let url = manifest_url(&base, ManifestRoute::VideoMaster, &lesson("42")).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/api/videos/42/master.m3u8");
    }

    #[test]
    fn test_base_prefix_is_kept() {
        let base = Url::parse("https://learn.example.com/platform/").unwrap();
        let url = manifest_url(&base, ManifestRoute::HlsStream, &lesson("abc")).unwrap();
        assert_eq!(url.as_str(), "https://learn.example.com/platform/api/hls/stream/abc");
    }

    #[test]
    fn test_lesson_id_is_one_segment() {
        let base = Url::parse("http://localhost:5000").unwrap();
        let url = manifest_url(&base, ManifestRoute::HlsStream, &lesson("a/b c")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/hls/stream/a%2Fb%20c");
    }

    #[test]
    fn test_same_lesson_same_url() {
        let base = Url::parse("http://localhost:5000").unwrap();
        let a = manifest_url(&base, ManifestRoute::HlsStream, &lesson("abc")).unwrap();
        let b = manifest_url(&base, ManifestRoute::HlsStream, &lesson("abc")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_route_from_str() {
        assert_eq!("hls-stream".parse::<ManifestRoute>().unwrap(), ManifestRoute::HlsStream);
        assert_eq!("Video-Master".parse::<ManifestRoute>().unwrap(), ManifestRoute::VideoMaster);
        assert!("dash".parse::<ManifestRoute>().is_err());
    }
}
