//! Label normalization.
//!
//! Role and title labels coming from ESI are matched against group names,
//! so both sides are brought to a comparable form first.

/// Canonicalizes a raw role or title label into an entitlement token.
///
/// Lowercases, trims, turns underscores into spaces and strips markup tags
/// such as `<color=0xff00ff00>` or `<b>`, keeping the text between them.
/// Returns `None` when no text is left.
///
/// ```
/// use roster_sync::normalize_label;
///
/// assert_eq!(normalize_label("  Fleet_Commander  ").as_deref(), Some("fleet commander"));
/// assert_eq!(normalize_label("<b>CEO</b>").as_deref(), Some("ceo"));
/// assert_eq!(normalize_label("<i></i>"), None);
/// ```
pub fn normalize_label(raw: &str) -> Option<String> {
    let folded = raw.to_lowercase();
    let spaced = folded.trim().replace('_', " ");
    let text = strip_markup(&spaced);
    let text = text.trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Case-folds and trims a group name or configured keyword.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Removes every complete `<...>` tag. An unterminated `<` is kept as text.
fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }

    out.push_str(rest);
    out
}
