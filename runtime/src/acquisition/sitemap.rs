//! Parse sitemap.xml and sitemap index files.
//!
//! Namespace-aware: only elements in the sitemaps.org namespace (or with no
//! namespace at all) are read, so extension elements such as `image:loc`
//! never leak into the results.

use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

/// Namespace of the sitemaps.org protocol.
pub const SITEMAP_NS: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// Which container an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `<sitemapindex><sitemap>`: points at a child sitemap.
    Sitemap,
    /// `<urlset><url>`: points at a page.
    Url,
}

/// An entry from a sitemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub kind: EntryKind,
    pub loc: String,
    /// Raw `<lastmod>` text, if present.
    pub lastmod: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    Lastmod,
}

fn in_sitemap_ns(ns: &ResolveResult<'_>) -> bool {
    match ns {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(Namespace(uri)) => *uri == SITEMAP_NS,
        ResolveResult::Unknown(_) => false,
    }
}

/// Parse a sitemap or sitemap index document into entries, in document order.
pub fn parse_sitemap(xml: &[u8]) -> Result<Vec<SitemapEntry>> {
    let mut reader = NsReader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut current: Option<EntryKind> = None;
    let mut field: Option<Field> = None;
    let mut loc = String::new();
    let mut lastmod = String::new();

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(e))) if in_sitemap_ns(&ns) => {
                match e.local_name().as_ref() {
                    b"url" => {
                        current = Some(EntryKind::Url);
                        loc.clear();
                        lastmod.clear();
                    }
                    b"sitemap" => {
                        current = Some(EntryKind::Sitemap);
                        loc.clear();
                        lastmod.clear();
                    }
                    b"loc" if current.is_some() => field = Some(Field::Loc),
                    b"lastmod" if current.is_some() => field = Some(Field::Lastmod),
                    _ => {}
                }
            }
            Ok((ns, Event::End(e))) if in_sitemap_ns(&ns) => {
                match e.local_name().as_ref() {
                    b"loc" | b"lastmod" => field = None,
                    b"url" | b"sitemap" => {
                        if let Some(kind) = current.take() {
                            if !loc.is_empty() {
                                entries.push(SitemapEntry {
                                    kind,
                                    loc: loc.trim().to_string(),
                                    lastmod: (!lastmod.is_empty())
                                        .then(|| lastmod.trim().to_string()),
                                });
                            }
                        }
                        field = None;
                    }
                    _ => {}
                }
            }
            Ok((_, Event::Text(e))) => {
                if let Some(f) = field {
                    let text = e
                        .unescape()
                        .map_err(|err| anyhow::anyhow!("XML parse error: {err}"))?;
                    push_text(f, &text, &mut loc, &mut lastmod);
                }
            }
            Ok((_, Event::CData(e))) => {
                if let Some(f) = field {
                    let text = String::from_utf8_lossy(&e).to_string();
                    push_text(f, &text, &mut loc, &mut lastmod);
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                return Err(anyhow::anyhow!("XML parse error: {e}"));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn push_text(field: Field, text: &str, loc: &mut String, lastmod: &mut String) {
    match field {
        Field::Loc => loc.push_str(text),
        Field::Lastmod => lastmod.push_str(text),
    }
}

/// Child sitemap URLs of a sitemap index.
pub fn child_sitemaps(entries: &[SitemapEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Sitemap)
        .map(|e| e.loc.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urlset() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
          <url>
            <loc>https://www.zillow.com/homedetails/1-A-St-Town-CA-90001/1_zpid/</loc>
            <lastmod>2024-01-15T12:00:00Z</lastmod>
            <image:image><image:loc>https://photos.example.com/1.jpg</image:loc></image:image>
          </url>
          <url>
            <loc>https://www.zillow.com/homedetails/2-B-St-Town-CA-90001/2_zpid/</loc>
          </url>
        </urlset>"#;

        let entries = parse_sitemap(xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Url);
        assert!(entries[0].loc.ends_with("/1_zpid/"));
        assert_eq!(entries[0].lastmod.as_deref(), Some("2024-01-15T12:00:00Z"));
        assert_eq!(entries[1].lastmod, None);
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap>
            <loc>https://example.com/sitemap-1.xml.gz</loc>
            <lastmod>2024-02-01</lastmod>
          </sitemap>
          <sitemap>
            <loc>https://example.com/sitemap-2.xml.gz</loc>
          </sitemap>
        </sitemapindex>"#;

        let entries = parse_sitemap(xml).unwrap();
        assert_eq!(
            child_sitemaps(&entries),
            vec![
                "https://example.com/sitemap-1.xml.gz".to_string(),
                "https://example.com/sitemap-2.xml.gz".to_string()
            ]
        );
    }

    #[test]
    fn test_prefixed_sitemap_namespace() {
        let xml = br#"<sm:urlset xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sm:url><sm:loc>https://example.com/a</sm:loc></sm:url>
        </sm:urlset>"#;
        let entries = parse_sitemap(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].loc, "https://example.com/a");
    }

    #[test]
    fn test_foreign_namespace_is_ignored() {
        let xml = br#"<urlset xmlns="http://example.com/not-sitemaps">
          <url><loc>https://example.com/a</loc></url>
        </urlset>"#;
        assert!(parse_sitemap(xml).unwrap().is_empty());
    }

    #[test]
    fn test_escaped_loc() {
        let xml = br#"<urlset><url><loc>https://example.com/?a=1&amp;b=2</loc></url></urlset>"#;
        let entries = parse_sitemap(xml).unwrap();
        assert_eq!(entries[0].loc, "https://example.com/?a=1&b=2");
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(parse_sitemap(b"<urlset><url><loc>x</url></urlset>").is_err());
    }

    /// Fuzz test: sitemap parser must never panic on arbitrary input.
    #[test]
    fn test_fuzz_sitemap_parser() {
        let repeated = "<url>".repeat(10000);
        let fuzz_inputs: [&[u8]; 9] = [
            b"",
            b"not xml at all",
            b"<",
            b"<url><loc>",
            b"<<<>>>",
            b"<urlset><url></url></urlset>",
            b"<urlset><url><loc></loc></url></urlset>",
            repeated.as_bytes(),
            b"\x00\x01\x02\x03",
        ];

        for input in fuzz_inputs {
            let _ = parse_sitemap(input);
        }
    }
}
