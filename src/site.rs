// site.rs
// Shared page plumbing: path-depth prefixes, nav fragment loading and URL rewriting.

use crate::assets::AssetSource;
use anyhow::Result;

pub const NAV_FRAGMENT: &str = "includes/nav.html";
pub const MOBILE_MENU_FRAGMENT: &str = "includes/mobile-menu.html";

fn clean_path(pathname: &str) -> &str {
    let end = pathname.find(['?', '#']).unwrap_or(pathname.len());
    &pathname[..end]
}

fn segments(pathname: &str) -> Vec<&str> {
    clean_path(pathname).split('/').filter(|s| !s.is_empty()).collect()
}

/// Directory segments of the page path; an `.html` file name doesn't count.
pub fn depth(pathname: &str) -> usize {
    segments(pathname).into_iter().filter(|s| !s.ends_with(".html")).count()
}

/// `../` per directory level. Root pages get an empty prefix.
pub fn base_path(pathname: &str) -> String {
    "../".repeat(depth(pathname))
}

/// Fragment prefix: `../` when the page sits in one of the known subdirectories.
pub fn path_prefix(pathname: &str, subdirs: &[String]) -> &'static str {
    let in_subdir = segments(pathname)
        .iter()
        .filter(|s| !s.ends_with(".html"))
        .any(|s| subdirs.iter().any(|d| d.as_str() == *s));
    if in_subdir { "../" } else { "" }
}

/// Resolves `relative` against the directory of `pathname`, yielding a site-root
/// relative path. `..` never climbs above the root.
pub fn resolve(pathname: &str, relative: &str) -> String {
    let clean = clean_path(pathname);
    let dir = match clean.rfind('/') {
        Some(i) => &clean[..i],
        None => "",
    };
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in relative.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

pub fn should_prefix_url(value: &str) -> bool {
    !(value.is_empty()
        || value.starts_with('#')
        || value.starts_with("http://")
        || value.starts_with("https://")
        || value.starts_with("mailto:")
        || value.starts_with("tel:")
        || value.starts_with('/'))
}

/// Prefixes relative `href` values on any element and `src` values on `<img>`.
pub fn prefix_relative_urls(html: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return html.to_string();
    }
    let bytes = html.as_bytes();
    let mut inserts = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        if html[i..].starts_with("<!--") {
            i = html[i..].find("-->").map(|p| i + p + 3).unwrap_or(bytes.len());
            continue;
        }
        i = scan_tag(html, i + 1, &mut inserts);
    }

    let mut out = String::with_capacity(html.len() + inserts.len() * prefix.len());
    let mut last = 0;
    for pos in inserts {
        out.push_str(&html[last..pos]);
        out.push_str(prefix);
        last = pos;
    }
    out.push_str(&html[last..]);
    out
}

/// Walks one tag's attributes starting after `<`; returns the index after the tag.
fn scan_tag(html: &str, start: usize, inserts: &mut Vec<usize>) -> usize {
    let bytes = html.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    if i == start {
        // Closing tag, doctype or a stray '<'.
        return start;
    }
    let tag = html[start..i].to_ascii_lowercase();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return i;
        }
        match bytes[i] {
            b'>' => return i + 1,
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        let name = html[name_start..i].to_ascii_lowercase();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return i;
        }
        let (value_start, value_end, next) = match bytes[i] {
            q @ (b'"' | b'\'') => {
                let vs = i + 1;
                let ve = html[vs..].find(q as char).map(|p| vs + p).unwrap_or(bytes.len());
                (vs, ve, (ve + 1).min(bytes.len()))
            }
            _ => {
                let vs = i;
                let mut ve = i;
                while ve < bytes.len() && !bytes[ve].is_ascii_whitespace() && bytes[ve] != b'>' {
                    ve += 1;
                }
                (vs, ve, ve)
            }
        };
        let rewrite = name == "href" || (name == "src" && tag == "img");
        if rewrite && should_prefix_url(&html[value_start..value_end]) {
            inserts.push(value_start);
        }
        i = next;
    }
}

/// `data-nav` key of the current page.
pub fn active_nav_key(pathname: &str) -> Option<&'static str> {
    const SECTIONS: [&str; 7] = ["manual", "economics", "research", "whitepaper", "vetter", "dao", "metrics"];
    let segs = segments(pathname);
    for key in SECTIONS {
        if segs.iter().any(|s| s.strip_suffix(".html").unwrap_or(*s) == key) {
            return Some(key);
        }
    }
    match segs.last().copied() {
        None | Some("index.html") => Some("home"),
        Some("features.html") => Some("features"),
        Some("manifesto.html") => Some("manifesto"),
        Some("stake.html") => Some("stake"),
        Some("vote.html") => Some("vote"),
        Some("privacy.html") => Some("privacy"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavFragments {
    pub prefix: &'static str,
    pub nav: String,
    pub mobile_menu: String,
}

/// Fetches both nav partials together and rewrites their relative URLs for the page depth.
pub async fn load_fragments(
    assets: &dyn AssetSource,
    pathname: &str,
    subdirs: &[String],
) -> Result<NavFragments> {
    let prefix = path_prefix(pathname, subdirs);
    let nav_path = resolve(pathname, &format!("{prefix}{NAV_FRAGMENT}"));
    let menu_path = resolve(pathname, &format!("{prefix}{MOBILE_MENU_FRAGMENT}"));
    let (nav, menu) = tokio::try_join!(assets.fetch(&nav_path), assets.fetch(&menu_path))?;
    let nav = nav.ok_or_else(|| anyhow::anyhow!("nav fragment not found at {nav_path}"))?;
    let menu = menu.ok_or_else(|| anyhow::anyhow!("mobile menu fragment not found at {menu_path}"))?;
    Ok(NavFragments {
        prefix,
        nav: prefix_relative_urls(&nav, prefix),
        mobile_menu: prefix_relative_urls(&menu, prefix),
    })
}

/// Nav entry revealed in developer mode for a "coming soon" label.
pub fn coming_soon_link(text: &str) -> String {
    let text = text.trim();
    if text == "stake" {
        format!("/{text}.html")
    } else {
        format!("/{text}/")
    }
}
