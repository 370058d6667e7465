//! Document parsing seam.
//!
//! The indexer never inspects file formats itself; it asks a
//! [`ParserRegistry`] whether a path is parseable and for its text. Parsers
//! implement [`DocumentParser`] and are selected by lowercase file extension.
//! The bundled parsers cover plain text and markdown; richer formats (PDF,
//! OOXML) plug in through the same trait.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

/// Parsed document text plus optional pagination.
///
/// `page_breaks` holds the character offsets at which a new page starts
/// (page 1 starts at 0 and is not listed). Parsers without a page concept
/// leave it empty.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub text: String,
    pub page_breaks: Vec<usize>,
}

pub trait DocumentParser: Send + Sync {
    fn name(&self) -> &str;
    /// Lowercase extensions this parser claims, without the leading dot.
    fn extensions(&self) -> &[&str];
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;
}

/// Extension-keyed dispatch table over [`DocumentParser`] implementations.
pub struct ParserRegistry {
    by_ext: HashMap<String, Arc<dyn DocumentParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        ParserRegistry {
            by_ext: HashMap::new(),
        }
    }

    /// Registry with the bundled plain-text and markdown parsers.
    pub fn with_defaults() -> Self {
        let mut registry = ParserRegistry::new();
        registry.register(Arc::new(PlainTextParser));
        registry.register(Arc::new(MarkdownParser));
        registry
    }

    /// Later registrations win on extension conflicts.
    pub fn register(&mut self, parser: Arc<dyn DocumentParser>) {
        for ext in parser.extensions() {
            self.by_ext.insert(ext.to_lowercase(), parser.clone());
        }
    }

    pub fn can_parse(&self, path: &Path) -> bool {
        self.parser_for(path).is_some()
    }

    pub fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        match self.parser_for(path) {
            Some(parser) => parser
                .parse(path)
                .with_context(|| format!("parsing {}", path.display())),
            None => bail!("no parser registered for {}", path.display()),
        }
    }

    fn parser_for(&self, path: &Path) -> Option<&Arc<dyn DocumentParser>> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.by_ext.get(&ext)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        ParserRegistry::with_defaults()
    }
}

/// Reads UTF-8 text as-is. Form feed characters (`\f`) are treated as page
/// separators and reported as page breaks.
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "text", "log", "rst", "org", "csv"]
    }

    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let text = fs::read_to_string(path)?;
        let page_breaks = text
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == '\u{0c}')
            .map(|(i, _)| i + 1)
            .collect();
        Ok(ParsedDocument { text, page_breaks })
    }
}

/// Markdown parser: strips a leading YAML front-matter block and returns the
/// body verbatim. Chunking works well enough on raw markdown that no markup
/// stripping is done.
pub struct MarkdownParser;

impl DocumentParser for MarkdownParser {
    fn name(&self) -> &str {
        "markdown"
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let raw = fs::read_to_string(path)?;
        Ok(ParsedDocument {
            text: strip_front_matter(&raw).to_string(),
            page_breaks: Vec::new(),
        })
    }
}

/// Drop a `---` ... `---` front-matter block at the very start of the text.
/// Unterminated blocks are left alone.
fn strip_front_matter(text: &str) -> &str {
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else { return text };
    if first.trim_end() != "---" {
        return text;
    }
    let mut consumed = first.len();
    for line in lines {
        consumed += line.len();
        if line.trim_end() == "---" {
            return &text[consumed..];
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_can_parse_by_extension() {
        let registry = ParserRegistry::with_defaults();
        assert!(registry.can_parse(Path::new("/a/b/notes.md")));
        assert!(registry.can_parse(Path::new("readme.TXT")));
        assert!(!registry.can_parse(Path::new("photo.png")));
        assert!(!registry.can_parse(Path::new("no_extension")));
    }

    #[test]
    fn test_parse_unregistered_extension_fails() {
        let registry = ParserRegistry::with_defaults();
        assert!(registry.parse(Path::new("/tmp/x.bin")).is_err());
    }

    #[test]
    fn test_plain_text_form_feed_page_breaks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paged.txt");
        fs::write(&path, "page one\u{0c}page two\u{0c}page three").unwrap();

        let parsed = ParserRegistry::with_defaults().parse(&path).unwrap();
        assert_eq!(parsed.page_breaks, vec![9, 18]);
        assert!(parsed.text.starts_with("page one"));
    }

    #[test]
    fn test_markdown_strips_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "---\ntitle: Test\ntags: [a, b]\n---\n# Heading\n\nBody.").unwrap();

        let parsed = ParserRegistry::with_defaults().parse(&path).unwrap();
        assert_eq!(parsed.text, "# Heading\n\nBody.");
    }

    #[test]
    fn test_markdown_unterminated_front_matter_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "---\ntitle: Broken\n# Heading").unwrap();

        let parsed = ParserRegistry::with_defaults().parse(&path).unwrap();
        assert!(parsed.text.starts_with("---"));
    }
}
