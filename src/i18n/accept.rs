//! Accept-Language header parsing.

/// Split an `Accept-Language` header into language tags, most preferred first.
///
/// Tags with equal quality keep their header order; `q=0` and the `*` wildcard are
/// dropped. A malformed quality value counts as 0.
pub fn parse_accept_language(header: &str) -> Vec<String> {
    let mut weighted: Vec<(String, f32)> = Vec::new();

    for part in header.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut components = trimmed.split(';');
        let tag = components.next().unwrap_or_default().trim();
        if tag.is_empty() || tag == "*" {
            continue;
        }

        let mut quality = 1.0_f32;
        for param in components {
            if let Some(value) = param.trim().strip_prefix("q=") {
                quality = value.trim().parse().unwrap_or(0.0);
            }
        }

        if quality > 0.0 {
            weighted.push((tag.to_string(), quality));
        }
    }

    // Stable sort keeps header order for equal weights
    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
    weighted.into_iter().map(|(tag, _)| tag).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_by_quality() {
        assert_eq!(
            parse_accept_language("en;q=0.5, de, fr;q=0.8"),
            vec!["de", "fr", "en"]
        );
    }

    #[test]
    fn test_equal_quality_keeps_order() {
        assert_eq!(parse_accept_language("fr-CA,fr,en"), vec!["fr-CA", "fr", "en"]);
    }

    #[test]
    fn test_drops_zero_quality_and_wildcard() {
        assert_eq!(parse_accept_language("de;q=0, *;q=0.1, it"), vec!["it"]);
    }

    #[test]
    fn test_malformed_quality() {
        assert_eq!(parse_accept_language("es;q=abc,pt"), vec!["pt"]);
    }

    #[test]
    fn test_empty_header() {
        assert!(parse_accept_language("").is_empty());
        assert!(parse_accept_language(" , ,").is_empty());
    }
}
