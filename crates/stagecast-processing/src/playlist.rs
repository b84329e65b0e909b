//! HLS manifest text.

use crate::ladder::Rung;
use stagecast_core::constants::media_data_url;
use std::collections::HashMap;

/// Point each segment reference at its served location.
///
/// `renames` maps the encoder's segment file name to the stored media name.
/// Only whole lines equal to an old name are rewritten.
pub fn rewrite_segments(manifest: &str, renames: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(manifest.len());
    for line in manifest.lines() {
        match renames.get(line.trim()) {
            Some(new_name) => out.push_str(&media_data_url(new_name)),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

/// Master manifest listing one variant per rung, in ladder order.
pub fn master_manifest(variants: &[(Rung, String)]) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for (rung, manifest_name) in variants {
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}\n",
            rung.bandwidth,
            rung.resolution,
            media_data_url(manifest_name)
        ));
    }
    playlist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::LADDER;

    #[test]
    fn test_rewrite_only_touches_segment_lines() {
        let manifest = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\n0.ts\n#EXTINF:4.2,\n1.ts\n#EXT-X-ENDLIST\n";
        let renames = HashMap::from([
            ("0.ts".to_string(), "media_a.ts".to_string()),
            ("1.ts".to_string(), "media_b.ts".to_string()),
        ]);

        let rewritten = rewrite_segments(manifest, &renames);
        assert_eq!(
            rewritten,
            "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\n/media/data/media_a.ts\n#EXTINF:4.2,\n/media/data/media_b.ts\n#EXT-X-ENDLIST\n"
        );
    }

    #[test]
    fn test_rewrite_does_not_match_prefixes() {
        let renames = HashMap::from([("1.ts".to_string(), "media_x.ts".to_string())]);
        assert_eq!(rewrite_segments("11.ts\n", &renames), "11.ts\n");
    }

    #[test]
    fn test_master_manifest_format() {
        let master = master_manifest(&[
            (LADDER[1], "media_hi.m3u8".to_string()),
            (LADDER[3], "media_lo.m3u8".to_string()),
        ]);
        assert_eq!(
            master,
            "#EXTM3U\n#EXT-X-VERSION:3\n\
             #EXT-X-STREAM-INF:BANDWIDTH=3134000,RESOLUTION=1280x720\n/media/data/media_hi.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=958000,RESOLUTION=640x360\n/media/data/media_lo.m3u8\n"
        );
    }
}
