use crate::parsers::source::{SourceDocs, extract_link_text};
use std::path::PathBuf;

#[test]
fn test_extract_link_text_exact_target() {
    let content = "See [the tracking guide](/guides/track) or [other](/guides/track#x).";
    assert_eq!(
        extract_link_text(content, "/guides/track").as_deref(),
        Some("the tracking guide")
    );
    assert_eq!(
        extract_link_text(content, "/guides/track#x").as_deref(),
        Some("other")
    );
    assert_eq!(extract_link_text(content, "/guides"), None);
}

#[test]
fn test_extract_link_text_escapes_target() {
    let content = "[query](/search?q=a+b) and [paren](/x)";
    assert_eq!(
        extract_link_text(content, "/search?q=a+b").as_deref(),
        Some("query")
    );
}

#[test]
fn test_document_path_appends_extension() {
    let docs = SourceDocs::new("/docs");
    assert_eq!(docs.document_path("guides/a"), PathBuf::from("/docs/guides/a.mdx"));
    assert_eq!(docs.document_path("guides/a.mdx"), PathBuf::from("/docs/guides/a.mdx"));
    assert_eq!(docs.document_path("notes.md"), PathBuf::from("/docs/notes.md"));
    assert_eq!(docs.document_path("/abs/page"), PathBuf::from("/abs/page.mdx"));
}

#[tokio::test]
async fn test_link_text_reads_source_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("guides")).unwrap();
    std::fs::write(
        dir.path().join("guides/a.mdx"),
        "# Title\n\nRead [Quickstart](/old/quickstart) first.\n",
    )
    .unwrap();

    let docs = SourceDocs::new(dir.path());
    assert_eq!(
        docs.link_text("guides/a.mdx", "/old/quickstart").await.as_deref(),
        Some("Quickstart")
    );
    assert_eq!(docs.link_text("guides/a", "/old/quickstart").await.as_deref(), Some("Quickstart"));
    assert_eq!(docs.link_text("guides/missing.mdx", "/old/quickstart").await, None);
}
