use std::str::FromStr;

use pep440_rs::VersionSpecifiers;
use tracing::instrument;
use url::Url;

use crate::error::Error;

/// One archive link discovered on a project's simple-index page: its URL, the filename as it
/// appeared in the anchor text or href, and the `data-requires-python` attribute, if any.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ArchiveLink {
    /// The (possibly relative, always resolved against the page's `<base>`) download URL.
    pub url: Url,
    /// The filename, used to distinguish wheels from other distribution kinds.
    pub filename: String,
    /// The `Requires-Python` specifier the index advertised for this file, if present.
    /// Absent means "unspecified", which is equivalent to `*` (always satisfied).
    pub requires_python: Option<VersionSpecifiers>,
}

/// A blocking HTTP client for PEP 503 "simple" index pages.
#[derive(Debug, Clone)]
pub struct IndexClient {
    index_url: Url,
    http: reqwest::blocking::Client,
}

impl IndexClient {
    /// Construct a client rooted at `index_url`, e.g. `https://pypi.org/simple/`.
    pub fn new(index_url: Url) -> Self {
        Self {
            index_url,
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Fetch and parse the project page for `name`, returning every `.whl` link found.
    /// Non-wheel links (sdists, eggs) are dropped silently, matching this engine's scope.
    #[instrument(skip(self))]
    pub fn fetch_project(&self, name: &str) -> Result<Vec<ArchiveLink>, Error> {
        let page_url = self
            .index_url
            .join(&format!("{name}/"))
            .map_err(|err| Error::InvalidUrl(format!("{name}/"), self.index_url.to_string(), err))?;

        let response = self
            .http
            .get(page_url.clone())
            .send()
            .map_err(|err| Error::NetworkIo(page_url.to_string(), err))?
            .error_for_status()
            .map_err(|err| Error::NetworkIo(page_url.to_string(), err))?;
        let text = response
            .text()
            .map_err(|err| Error::NetworkIo(page_url.to_string(), err))?;

        parse_simple_index(&text, &page_url)
    }

    /// Issue a GET request for an archive's download URL. The caller handles streaming the
    /// response body to disk.
    pub fn download(&self, url: &Url) -> Result<reqwest::blocking::Response, reqwest::Error> {
        self.http.get(url.clone()).send()?.error_for_status()
    }
}

/// Parse a PEP 503-tolerant simple index page into its `.whl` archive links.
fn parse_simple_index(text: &str, page_url: &Url) -> Result<Vec<ArchiveLink>, Error> {
    let dom = tl::parse(text, tl::ParserOptions::default())
        .map_err(|err| Error::HtmlParse(page_url.to_string(), err))?;
    let parser = dom.parser();

    let base = dom
        .nodes()
        .iter()
        .filter_map(|node| node.as_tag())
        .find(|tag| tag.name().as_bytes() == b"base")
        .and_then(|tag| tag.attributes().get("href").flatten())
        .and_then(|href| std::str::from_utf8(href.as_bytes()).ok())
        .and_then(|href| Url::parse(href).ok())
        .unwrap_or_else(|| page_url.clone());

    let mut links = Vec::new();
    for node in dom.nodes() {
        let Some(tag) = node.as_tag() else { continue };
        if tag.name().as_bytes() != b"a" {
            continue;
        }
        let Some(Some(href)) = tag.attributes().get("href") else {
            continue;
        };
        let Ok(href) = std::str::from_utf8(href.as_bytes()) else {
            continue;
        };
        let url = match base.join(href) {
            Ok(url) => url,
            Err(_) => continue,
        };

        // The filename is whatever follows the last `/` in the href, stripped of any
        // PEP 503 fragment (e.g. `#sha256=...`).
        let filename = href
            .rsplit('/')
            .next()
            .unwrap_or(href)
            .split('#')
            .next()
            .unwrap_or(href)
            .to_string();
        if !filename.ends_with(".whl") {
            continue;
        }

        let requires_python = tag
            .attributes()
            .get("data-requires-python")
            .flatten()
            .and_then(|attr| std::str::from_utf8(attr.as_bytes()).ok())
            .and_then(|raw| {
                let unescaped = html_unescape(raw);
                VersionSpecifiers::from_str(&unescaped).ok()
            });

        links.push(ArchiveLink {
            url,
            filename,
            requires_python,
        });
    }
    let _ = parser;
    Ok(links)
}

/// A small, dependency-free unescape for the handful of entities simple-index pages use in the
/// `data-requires-python` attribute (`tl` itself leaves attribute text un-decoded).
fn html_unescape(s: &str) -> String {
    s.replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_anchors_and_requires_python() {
        let html = r#"
            <!DOCTYPE html>
            <html><body>
            <a href="foo-1.0-py3-none-any.whl" data-requires-python="&gt;=3.8">foo-1.0-py3-none-any.whl</a>
            <a href="foo-1.0.tar.gz">foo-1.0.tar.gz</a>
            </body></html>
        "#;
        let page_url = Url::parse("https://example.org/simple/foo/").unwrap();
        let links = parse_simple_index(html, &page_url).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].filename, "foo-1.0-py3-none-any.whl");
        assert!(links[0]
            .requires_python
            .as_ref()
            .unwrap()
            .contains(&"3.9".parse().unwrap()));
    }

    #[test]
    fn resolves_relative_links_against_page_url() {
        let html = r#"<a href="sub/bar-2.0-py3-none-any.whl">bar</a>"#;
        let page_url = Url::parse("https://example.org/simple/bar/").unwrap();
        let links = parse_simple_index(html, &page_url).unwrap();
        assert_eq!(
            links[0].url.as_str(),
            "https://example.org/simple/bar/sub/bar-2.0-py3-none-any.whl"
        );
    }

    #[test]
    fn no_requires_python_is_none() {
        let html = r#"<a href="foo-1.0-py3-none-any.whl">foo</a>"#;
        let page_url = Url::parse("https://example.org/simple/foo/").unwrap();
        let links = parse_simple_index(html, &page_url).unwrap();
        assert!(links[0].requires_python.is_none());
    }
}
