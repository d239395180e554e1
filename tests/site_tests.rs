// Site Plumbing Tests
// Translation fallback, page-depth prefixes and nav fragment loading from a real directory

use bonzi_stack::assets::FsAssets;
use bonzi_stack::i18n::{TextNode, Translator};
use bonzi_stack::prefs::{Preferences, LANG_KEY};
use bonzi_stack::site;
use bonzi_stack::{LocalStorage, MemoryStorage};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let full = root.join(rel);
    std::fs::create_dir_all(full.parent().expect("parent dir")).expect("Failed to create dir");
    std::fs::write(full, body).expect("Failed to write asset");
}

fn site_dir() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write(root, "i18n/en.json", r#"{"nav.home":"Home","nav.stake":"Stake","hero.title":"Meet Bonzi","empty":"English only"}"#);
    write(root, "i18n/de.json", r#"{"nav.home":"Startseite","hero.title":"","empty":""}"#);
    write(
        root,
        "includes/nav.html",
        r##"<nav><a href="index.html" data-nav="home">Home</a><a href="#top">Top</a><img src="img/logo.png"></nav>"##,
    );
    write(root, "includes/mobile-menu.html", r#"<div><a href="stake.html">Stake</a><a href="/abs.html">Abs</a></div>"#);
    temp_dir
}

#[tokio::test]
async fn test_translation_falls_back_to_english() {
    println!("🧪 Testing translation fallback...");

    let dir = site_dir();
    let storage = Arc::new(MemoryStorage::new());
    let prefs = Arc::new(Preferences::new(storage.clone()));
    let translator = Translator::new(Arc::new(FsAssets::new(dir.path())), "/index.html").with_preferences(prefs);

    let mut nodes = vec![
        TextNode::new("nav.home", "Home"),
        TextNode::new("nav.stake", "Stake"),
        TextNode::new("hero.title", "Meet Bonzi"),
        TextNode::new("missing.key", "Keep me"),
    ];
    let changed = translator.apply_translations("de", &mut nodes).await;
    assert_eq!(changed, 1);
    assert_eq!(nodes[0].text, "Startseite");
    assert_eq!(nodes[1].text, "Stake", "Missing German key uses English");
    assert_eq!(nodes[2].text, "Meet Bonzi", "Empty German value uses English");
    assert_eq!(nodes[3].text, "Keep me", "Unknown key leaves the text alone");
    assert_eq!(storage.get_item(LANG_KEY).unwrap().as_deref(), Some("de"));
    println!("  ✅ German applied with English fallback");

    let mut nodes = vec![TextNode::new("nav.home", "Home"), TextNode::new("empty", "")];
    translator.apply_translations("fr", &mut nodes).await;
    assert_eq!(nodes[0].text, "Home");
    assert_eq!(nodes[1].text, "English only");
    assert_eq!(translator.translate("fr", "nav.stake").await.as_deref(), Some("Stake"));
    println!("  ✅ Missing language file falls back to English");
}

#[tokio::test]
async fn test_catalog_urls_follow_page_depth() {
    println!("🧪 Testing catalog paths by page depth...");

    let dir = site_dir();
    let assets = Arc::new(FsAssets::new(dir.path()));

    let root_page = Translator::new(assets.clone(), "/index.html");
    assert_eq!(root_page.catalog_url("de"), "i18n/de.json");

    let sub_page = Translator::new(assets, "/manual/getting-started.html");
    assert_eq!(sub_page.catalog_url("de"), "../i18n/de.json");
    assert_eq!(sub_page.translate("de", "nav.home").await.as_deref(), Some("Startseite"));
    println!("  ✅ Subdirectory pages climb one level");

    assert_eq!(site::base_path("/"), "");
    assert_eq!(site::base_path("/dao/"), "../");
}

#[tokio::test]
async fn test_nav_fragments_are_rewritten_for_subdirectories() {
    println!("🧪 Testing nav fragment loading...");

    let dir = site_dir();
    let assets = FsAssets::new(dir.path());
    let subdirs = bonzi_stack::config::Site::default().subdirs;

    let frags = site::load_fragments(&assets, "/economics/index.html", &subdirs)
        .await
        .expect("fragments load from subdirectory");
    assert_eq!(frags.prefix, "../");
    assert!(frags.nav.contains(r#"href="../index.html""#));
    assert!(frags.nav.contains(r##"href="#top""##));
    assert!(frags.nav.contains(r#"src="../img/logo.png""#));
    assert!(frags.mobile_menu.contains(r#"href="../stake.html""#));
    assert!(frags.mobile_menu.contains(r#"href="/abs.html""#));
    println!("  ✅ Relative links prefixed with ../");

    let frags = site::load_fragments(&assets, "/stake.html", &subdirs).await.expect("root fragments");
    assert_eq!(frags.prefix, "");
    assert!(frags.nav.contains(r#"href="index.html""#));
    println!("  ✅ Root pages keep links untouched");

    let empty = TempDir::new().expect("Failed to create temp dir");
    let missing = FsAssets::new(empty.path());
    assert!(site::load_fragments(&missing, "/index.html", &subdirs).await.is_err());
    println!("  ✅ Missing fragments reported as an error");
}
