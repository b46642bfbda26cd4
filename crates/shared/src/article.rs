//! Derivation rules applied to articles before they are stored or shown.

/// Number of characters kept when an excerpt is derived from content.
pub const EXCERPT_LIMIT: usize = 150;

/// Appended to a derived excerpt when the content had to be cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Used when a title has no letters or digits to build a slug from.
pub const FALLBACK_SLUG: &str = "untitled";

/// Lowercase, ASCII-only, hyphen-separated form of `title`.
///
/// Every run of whitespace or punctuation becomes a single hyphen and
/// leading/trailing hyphens are dropped, so `slugify(slugify(t)) == slugify(t)`.
pub fn slugify(title: &str) -> String {
    slug::slugify(title)
}

/// Picks the explicit slug when one was supplied, otherwise derives it from the title.
pub fn derive_slug(explicit: Option<&str>, title: &str) -> String {
    let explicit = explicit.map(str::trim).filter(|s| !s.is_empty());
    let slug = match explicit {
        Some(slug) => slugify(slug),
        None => slugify(title),
    };
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Removes tags and comments from `html`, keeping the text in between.
///
/// A `<` only opens a tag when followed by a letter, `/`, `!` or `?`;
/// otherwise it is kept as text. A `>` inside a quoted attribute does not
/// close the tag. An unclosed tag or comment swallows the rest of the input.
pub fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if !opens_tag(&tail[1..]) {
            out.push('<');
            rest = &tail[1..];
            continue;
        }

        if let Some(comment) = tail.strip_prefix("<!--") {
            match comment.find("-->") {
                Some(end) => rest = &comment[end + 3..],
                None => return out,
            }
            continue;
        }

        let mut quote: Option<char> = None;
        let mut close = None;
        for (idx, ch) in tail.char_indices().skip(1) {
            match (quote, ch) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(ch),
                (None, '>') => {
                    close = Some(idx);
                    break;
                }
                _ => {}
            }
        }
        match close {
            Some(idx) => rest = &tail[idx + 1..],
            None => return out,
        }
    }

    out.push_str(rest);
    out
}

fn opens_tag(after_bracket: &str) -> bool {
    matches!(
        after_bracket.chars().next(),
        Some(c) if c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?')
    )
}

/// Cuts `text` to at most `limit` characters, right-trimming the cut and
/// appending [`TRUNCATION_MARKER`]. Text that already fits is returned as is.
pub fn limit_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut out = text[..cut].trim_end().to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

/// The excerpt shown for an article: the stored one when present and
/// non-empty, otherwise a plain-text prefix of the content.
pub fn excerpt_of(stored: Option<&str>, content: &str) -> String {
    match stored {
        Some(excerpt) if !excerpt.is_empty() => excerpt.to_string(),
        _ => limit_chars(&strip_markup(content), EXCERPT_LIMIT),
    }
}
