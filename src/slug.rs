/// Turns a display name into a URL-safe slug: lowercase ASCII letters
/// and digits separated by single hyphens.
/// Anything else, accented letters included, is dropped.
///
/// ```
/// use trackmyshow::slug::slugify;
/// assert_eq!(slugify("Summer Jazz Night"), "summer-jazz-night");
/// assert_eq!(slugify("Café -- Olé!"), "caf-ol");
/// assert_eq!(slugify("  "), "");
/// ```
pub fn slugify(name: impl AsRef<str>) -> String {
    let kept: String = name
        .as_ref()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    kept.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
