//! Output file name sanitization

/// Make a provider-supplied song name safe to use as a file name
///
/// Path separators and characters reserved on Windows are swapped for
/// look-alike Unicode characters so names like `AC/DC - Thunderstruck.mp3`
/// stay readable instead of creating a subdirectory. Surrounding whitespace
/// and trailing dots (rejected by Windows) are stripped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_song_name("AC/DC - T.N.T.mp3"), "AC⧸DC - T.N.T.mp3");
/// ```
pub fn sanitize_song_name(name: &str) -> String {
    let replaced: String = name.chars().map(replacement).collect();
    replaced.trim().trim_end_matches('.').trim_end().to_string()
}

fn replacement(c: char) -> char {
    match c {
        '/' => '⧸',
        '\\' => '⧹',
        ':' => '꞉',
        '*' => '⁎',
        '?' => '？',
        '"' => '″',
        '<' => '‹',
        '>' => '›',
        '|' => '｜',
        c if c.is_control() => '_',
        c => c,
    }
}
