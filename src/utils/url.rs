// src/utils/url.rs

//! Conference and talk URL grammar.

use url::Url;

use crate::models::{Session, UrlRules};

impl UrlRules {
    /// Parse `url` and return its path segments below the configured prefix,
    /// provided the host is allowed.
    fn segments_below_prefix(&self, url: &str) -> Option<Vec<String>> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        if !self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            return None;
        }

        let segments: Vec<String> = parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.len() < self.path_prefix.len()
            || segments.iter().zip(&self.path_prefix).any(|(a, b)| a != b)
        {
            return None;
        }
        Some(segments[self.path_prefix.len()..].to_vec())
    }

    fn is_excluded(&self, url: &str) -> bool {
        let path = Url::parse(url)
            .map(|u| u.path().to_lowercase())
            .unwrap_or_default();
        self.excluded_fragments.iter().any(|f| path.contains(f.as_str()))
    }

    /// Parse `<YYYY>/<MM>` segments into a session within the configured range.
    fn session_from(&self, year: &str, month: &str) -> Option<Session> {
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !self.session_months.iter().any(|m| m == month) {
            return None;
        }
        let year: u16 = year.parse().ok()?;
        if year < self.min_year || year > self.max_year {
            return None;
        }
        Some(Session {
            year,
            month: month.parse().ok()?,
        })
    }

    /// A conference index page: `<prefix>/<YYYY>/<MM>` and nothing after.
    pub fn is_conference_url(&self, url: &str) -> bool {
        if self.is_excluded(url) {
            return false;
        }
        match self.segments_below_prefix(url).as_deref() {
            Some([year, month]) => self.session_from(year, month).is_some(),
            _ => false,
        }
    }

    /// A talk page: `<prefix>/<YYYY>/<MM>/<slug>`, not a session, speaker or
    /// decade page.
    pub fn is_talk_url(&self, url: &str) -> bool {
        if self.is_excluded(url) {
            return false;
        }
        match self.segments_below_prefix(url).as_deref() {
            Some([year, month, _slug, ..]) => self.session_from(year, month).is_some(),
            _ => false,
        }
    }

    /// Session a conference or talk URL belongs to.
    pub fn session(&self, url: &str) -> Option<Session> {
        match self.segments_below_prefix(url).as_deref() {
            Some([year, month, ..]) => self.session_from(year, month),
            _ => None,
        }
    }
}

/// Resolve an href against the page URL, dropping any fragment.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let mut joined = base.join(href.trim()).ok()?;
    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }
    joined.set_fragment(None);
    Some(joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.churchofjesuschrist.org/study/general-conference";

    #[test]
    fn test_conference_grammar() {
        let rules = UrlRules::default();
        assert!(rules.is_conference_url(&format!("{BASE}/2024/04?lang=eng")));
        assert!(rules.is_conference_url(
            "https://conference.lds.org/study/general-conference/1975/10?lang=spa"
        ));
        assert!(rules.is_conference_url(&format!("{BASE}/1990/10/")));

        // wrong month, out of range, talk page, decade page, foreign host
        assert!(!rules.is_conference_url(&format!("{BASE}/2024/06?lang=eng")));
        assert!(!rules.is_conference_url(&format!("{BASE}/1960/04?lang=eng")));
        assert!(!rules.is_conference_url(&format!("{BASE}/2024/04/13holland?lang=eng")));
        assert!(!rules.is_conference_url(&format!("{BASE}/20102019?lang=eng")));
        assert!(!rules.is_conference_url(
            "https://example.com/study/general-conference/2024/04"
        ));
        assert!(!rules.is_conference_url(&format!("{BASE}/speakers/2024/04")));
    }

    #[test]
    fn test_talk_grammar() {
        let rules = UrlRules::default();
        assert!(rules.is_talk_url(&format!("{BASE}/2024/04/13holland?lang=eng")));
        assert!(!rules.is_talk_url(&format!("{BASE}/2024/04?lang=eng")));
        assert!(!rules.is_talk_url(&format!(
            "{BASE}/2024/04/saturday-morning-session?lang=eng"
        )));
        assert!(!rules.is_talk_url(&format!("{BASE}/speakers/jane-doe?lang=eng")));
    }

    #[test]
    fn test_session() {
        let rules = UrlRules::default();
        assert_eq!(
            rules.session(&format!("{BASE}/1985/04/faith?lang=spa")),
            Some(Session {
                year: 1985,
                month: 4
            })
        );
        assert_eq!(rules.session("https://www.churchofjesuschrist.org/study/manual/x"), None);
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse(&format!("{BASE}/2024/04?lang=eng")).unwrap();
        assert_eq!(
            resolve_link(&base, "/study/general-conference/2024/04/talk?lang=eng#p1").as_deref(),
            Some("https://www.churchofjesuschrist.org/study/general-conference/2024/04/talk?lang=eng")
        );
        assert_eq!(resolve_link(&base, "mailto:someone@example.com"), None);
    }
}
