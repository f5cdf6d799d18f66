//! Tile links on an archive index page.

use regex::Regex;
use reqwest::Url;

use crate::error::{DownloadError, Result};

/// Finds tile links on directory-listing pages.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    href: Regex,
}

impl LinkExtractor {
    pub fn new() -> Result<Self> {
        let href = Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#)
            .map_err(|e| DownloadError::Config(format!("link pattern: {}", e)))?;
        Ok(Self { href })
    }

    /// Absolute URLs of every `.tif` anchor on `html`, resolved against `page`.
    ///
    /// First-seen order, duplicates dropped. Links that do not resolve are
    /// skipped with a debug log.
    pub fn tif_links(&self, page: &Url, html: &str) -> Vec<Url> {
        let mut links: Vec<Url> = Vec::new();
        for captures in self.href.captures_iter(html) {
            let href = captures[1].trim();
            match page.join(href) {
                Ok(url) if url.path().ends_with(".tif") => {
                    if !links.contains(&url) {
                        links.push(url);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(href, error = %e, "Skipping unresolvable link"),
            }
        }
        links
    }
}

/// Last path segment of `url`, the name the tile is stored under.
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
<html><body><h1>Index of /maps/2021/</h1>
<a href="../">Parent Directory</a>
<a href="WD_MERGE_2021-07-14---2021-07-20_duration_6d_E051N030T3.tif">tile</a>
<A HREF='WD_MERGE_2021-07-14---2021-07-20_duration_6d_E051N031T3.tif'>tile</A>
<a class="f" href="WD_MERGE_2021-07-14---2021-07-20_duration_6d_E051N030T3.tif">again</a>
<a href="WD_MERGE_2021-07-14---2021-07-20_duration_6d_E051N030T3.tif.aux.xml">aux</a>
<a href="https://mirror.example.org/other/WD_MERGE_2021-10-01---2021-10-02_duration_1d_X.tif">mirror</a>
<a href="catalog.json">catalog</a>
</body></html>"#;

    fn page() -> Url {
        Url::parse("https://archive.example.org/maps/2021/").unwrap()
    }

    #[test]
    fn test_links_resolve_against_page() {
        let links = LinkExtractor::new().unwrap().tif_links(&page(), INDEX);
        let as_str: Vec<&str> = links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            as_str,
            vec![
                "https://archive.example.org/maps/2021/WD_MERGE_2021-07-14---2021-07-20_duration_6d_E051N030T3.tif",
                "https://archive.example.org/maps/2021/WD_MERGE_2021-07-14---2021-07-20_duration_6d_E051N031T3.tif",
                "https://mirror.example.org/other/WD_MERGE_2021-10-01---2021-10-02_duration_1d_X.tif",
            ]
        );
    }

    #[test]
    fn test_page_without_tiles() {
        let extractor = LinkExtractor::new().unwrap();
        assert!(extractor.tif_links(&page(), "<html><a href=\"../\">up</a></html>").is_empty());
        assert!(extractor.tif_links(&page(), "").is_empty());
    }

    #[test]
    fn test_file_name() {
        let url = page().join("WD_MERGE_x.tif").unwrap();
        assert_eq!(file_name(&url), Some("WD_MERGE_x.tif"));
        assert_eq!(file_name(&page()), None);
    }
}
