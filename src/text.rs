use chrono::NaiveDate;

/// Shown in place of a missing or broken poster.
pub const POSTER_PLACEHOLDER: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iNTAwIiBoZWlnaHQ9Ijc1MCIgdmlld0JveD0iMCAwIDUwMCA3NTAiIHhtbG5zPSJodHRwOi8vd3d3LnczLm9yZy8yMDAwL3N2ZyI+CiAgPHJlY3Qgd2lkdGg9IjEwMCUiIGhlaWdodD0iMTAwJSIgZmlsbD0iI2UwZTBlMCIvPgogIDx0ZXh0IHg9IjUwJSIgeT0iNTAlIiBkb21pbmFudC1iYXNlbGluZT0ibWlkZGxlIiB0ZXh0LWFuY2hvcj0ibWlkZGxlIiBmaWxsPSIjNjY2IiBmb250LWZhbWlseT0iQXJpYWwiIGZvbnQtc2l6ZT0iMjAiPgogICAgTm8gUG9zdGVyCiAgPC90ZXh0Pgo8L3N2Zz4=";

pub const POSTER_SIZE: &str = "w500";
pub const OVERVIEW_LIMIT: usize = 100;

const ELLIPSIS: &str = "...";

/// Shortens `text` to at most `max_chars` characters, preferring a word boundary.
///
/// The cut happens `max_chars - 3` characters in; if that prefix contains a space the
/// text is broken at the last one, then `"..."` is appended.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let len = text.chars().count();
    if len <= max_chars {
        return text.to_string();
    }
    if max_chars <= ELLIPSIS.len() {
        return ".".repeat(max_chars);
    }

    let cut = text
        .char_indices()
        .nth(max_chars - ELLIPSIS.len())
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let prefix = &text[..cut];
    let kept = match prefix.rfind(' ') {
        Some(space) => &prefix[..space],
        None => prefix,
    };
    format!("{kept}{ELLIPSIS}")
}

pub fn format_release_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// One decimal, as on the rating badge.
pub fn format_vote(vote: Option<f32>) -> String {
    format!("{:.1}", vote.filter(|v| v.is_finite()).unwrap_or(0.0))
}

pub fn poster_url(image_base_url: &str, poster_path: Option<&str>) -> String {
    match poster_path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => format!(
            "{}/{POSTER_SIZE}{}",
            image_base_url.trim_end_matches('/'),
            path
        ),
        None => POSTER_PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate("Heat", 10), "Heat");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn breaks_at_last_space() {
        assert_eq!(truncate("The quick brown fox", 13), "The quick...");
        assert_eq!(truncate("The quick brown fox", 12), "The...");
        assert_eq!(truncate("The quick brown fox", 10), "The...");
    }

    #[test]
    fn no_space_cuts_mid_word() {
        assert_eq!(truncate("Supercalifragilistic", 10), "Superca...");
    }

    #[test]
    fn tiny_limits_are_all_dots() {
        assert_eq!(truncate("abcdef", 3), "...");
        assert_eq!(truncate("abcdef", 2), "..");
        assert_eq!(truncate("abcdef", 0), "");
        assert_eq!(truncate("ab", 3), "ab");
    }

    #[test]
    fn never_exceeds_limit_and_respects_char_boundaries() {
        let text = "Амели с Монмартра, фильм о девушке, которая помогает другим";
        for n in 0..70 {
            let out = truncate(text, n);
            assert!(out.chars().count() <= n, "n={n} out={out}");
        }
    }

    #[test]
    fn formats_release_date() {
        assert_eq!(
            format_release_date(NaiveDate::from_ymd_opt(2021, 3, 5)),
            "Mar 05, 2021"
        );
        assert_eq!(format_release_date(None), "N/A");
    }

    #[test]
    fn formats_vote() {
        assert_eq!(format_vote(Some(7.26)), "7.3");
        assert_eq!(format_vote(Some(8.0)), "8.0");
        assert_eq!(format_vote(None), "0.0");
    }

    #[test]
    fn builds_poster_url_or_placeholder() {
        assert_eq!(
            poster_url("https://image.tmdb.org/t/p/", Some("/abc.jpg")),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
        assert_eq!(poster_url("https://image.tmdb.org/t/p", None), POSTER_PLACEHOLDER);
        assert_eq!(poster_url("https://image.tmdb.org/t/p", Some("")), POSTER_PLACEHOLDER);
    }
}
