//! Playlist URL detection.
//!
//! Expansion of a playlist into its entries costs a metadata probe, so the
//! pipeline first does a cheap substring check to decide whether a URL is
//! worth probing at all. The markers cover the playlist, album, channel and
//! set URL shapes of the common media hosts.

/// URL fragments that indicate a multi-entry page rather than a single item.
const PLAYLIST_MARKERS: &[&str] = &[
    "playlist",
    "list=",
    "album",
    "channel",
    "user/",
    "/playlists/",
    "set/",
    "sets/",
];

/// Check whether a URL looks like a playlist, album or channel page.
/// Matching is case-insensitive.
pub fn looks_like_playlist(url: &str) -> bool {
    let lowered = url.to_lowercase();
    PLAYLIST_MARKERS.iter().any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_detects_watch_url_with_list_parameter() {
        assert!(looks_like_playlist(
            "https://www.youtube.com/watch?v=abc123&list=PLxyz"
        ));
    }

    #[test]
    fn test_detects_playlist_path() {
        assert!(looks_like_playlist("https://www.youtube.com/playlist?list=PLxyz"));
        assert!(looks_like_playlist("https://example.com/user/feed/playlists/42"));
    }

    #[test]
    fn test_detects_channel_and_user_pages() {
        assert!(looks_like_playlist("https://www.youtube.com/channel/UCabc"));
        assert!(looks_like_playlist("https://example.com/user/somebody"));
    }

    #[test]
    fn test_detects_album_and_set_pages() {
        assert!(looks_like_playlist("https://artist.bandcamp.com/album/the-record"));
        assert!(looks_like_playlist("https://soundcloud.com/artist/sets/mixtape"));
    }

    #[test]
    fn test_plain_single_item_urls_pass_through() {
        assert!(!looks_like_playlist("https://www.youtube.com/watch?v=abc123"));
        assert!(!looks_like_playlist("https://youtu.be/abc123"));
        assert!(!looks_like_playlist("https://example.com/video/12345"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(looks_like_playlist("https://www.youtube.com/PLAYLIST?LIST=PLxyz"));
        assert!(looks_like_playlist("https://Artist.Bandcamp.com/ALBUM/x"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // *For any* URL built around one of the markers, detection holds no
        // matter how the rest of the URL is shaped.
        #[test]
        fn prop_marker_anywhere_in_url_is_detected(
            prefix in "[a-z:/.]{0,20}",
            marker_idx in 0usize..PLAYLIST_MARKERS.len(),
            suffix in "[a-z0-9=&/]{0,20}",
        ) {
            let url = format!("{}{}{}", prefix, PLAYLIST_MARKERS[marker_idx], suffix);
            prop_assert!(looks_like_playlist(&url));
        }
    }
}
