//! HLS playlist parsing
//!
//! Only the multivariant (master) level list matters to the player: segment
//! scheduling stays inside the streaming engine.

use crate::{error::Error, QualityRendition, Result};
use m3u8_rs::{MasterPlaylist, Playlist};
use tracing::debug;

/// Parse an HLS playlist into the rendition ladder the engine will expose.
///
/// Variant order is preserved so indices line up with engine level indices.
/// I-frame-only variants are skipped. A media playlist used as entry point
/// yields a single rendition of unknown resolution.
pub fn parse_master_playlist(content: &[u8]) -> Result<Vec<QualityRendition>> {
    let playlist = m3u8_rs::parse_playlist_res(content)
        .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS playlist: {:?}", e)))?;

    match playlist {
        Playlist::MasterPlaylist(master) => {
            let renditions = extract_renditions(&master);
            if renditions.is_empty() {
                return Err(Error::ManifestParse(
                    "Master playlist has no playable variants".to_string(),
                ));
            }
            debug!(renditions = renditions.len(), "Parsed master playlist");
            Ok(renditions)
        }
        Playlist::MediaPlaylist(media) => {
            debug!(segments = media.segments.len(), "Media playlist used as entry point");
            Ok(vec![QualityRendition::default()])
        }
    }
}

fn extract_renditions(master: &MasterPlaylist) -> Vec<QualityRendition> {
    master
        .variants
        .iter()
        .filter(|variant| !variant.is_i_frame)
        .map(|variant| {
            let (width, height) = variant
                .resolution
                .map(|r| (r.width as u32, r.height as u32))
                .unwrap_or((0, 0));

            QualityRendition {
                width,
                height,
                bitrate: variant.bandwidth,
                name: variant.video.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=842x480
480p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720p/index.m3u8
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=86000,URI=\"iframe.m3u8\"
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:6.0,
segment0.ts
#EXTINF:6.0,
segment1.ts
#EXT-X-ENDLIST
";

    #[test]
    fn test_parse_master() {
        let renditions = parse_master_playlist(MASTER.as_bytes()).unwrap();
        assert_eq!(renditions.len(), 3);
        assert_eq!(renditions[0], QualityRendition::new(640, 360, 800_000));
        assert_eq!(renditions[2].height, 720);
        assert_eq!(renditions[2].label(), "720p • 2.8 Mbps");
    }

    #[test]
    fn test_parse_media_playlist_entry_point() {
        let renditions = parse_master_playlist(MEDIA.as_bytes()).unwrap();
        assert_eq!(renditions.len(), 1);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_master_playlist(b"<html>not found</html>"),
            Err(Error::ManifestParse(_))
        ));
    }
}
