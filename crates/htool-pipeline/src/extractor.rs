//! Artifact extraction from agent replies
//!
//! Agents answer with prose interleaved with fenced blocks:
//!
//! ````text
//! Here is your tool:
//!
//! ```html
//! <!DOCTYPE html>
//! ...
//! ```
//! ````
//!
//! Exactly one block must qualify as the artifact. With several blocks the
//! single block tagged as the expected type wins; anything else is an error
//! rather than a guess.

use htool_core::config::ExtractionConfig;
use htool_core::{Artifact, ExtractionWarning, HtoolError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Markers recognised as document roots (compared case-insensitively)
const DOCUMENT_ROOT_MARKERS: &[&str] = &["<!doctype html", "<html"];

fn bare_document_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<!doctype\s+html.*</html\s*>").ok())
        .as_ref()
}

/// A fenced block found in a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// Position among the blocks of the reply (0-based)
    pub index: usize,
    /// Language tag after the opening marker, if any
    pub tag: Option<String>,
    /// Bytes between the fence lines, verbatim (line endings kept)
    pub content: String,
    /// 1-based line number of the opening fence
    pub line: usize,
}

impl FencedBlock {
    fn describe(&self) -> String {
        format!(
            "block #{} at line {} (tag: {}, {} bytes)",
            self.index + 1,
            self.line,
            self.tag.as_deref().unwrap_or("none"),
            self.content.trim().len()
        )
    }
}

/// Result of scanning a reply for fences
#[derive(Debug, Default)]
pub struct FenceScan {
    pub blocks: Vec<FencedBlock>,
    /// Line numbers of opening fences that were never closed
    pub unterminated: Vec<usize>,
}

/// Opening fence: marker char, run length, tag
fn parse_opening(line: &str) -> Option<(char, usize, Option<String>)> {
    let trimmed = line.trim();
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = trimmed.chars().take_while(|c| *c == marker).count();
    if run < 3 {
        return None;
    }

    let info = trimmed[run..].trim();
    // Backtick fences cannot carry backticks in their info string
    if marker == '`' && info.contains('`') {
        return None;
    }

    let tag = info
        .split_whitespace()
        .next()
        .map(|t| t.trim_start_matches('{').trim_start_matches('.').to_string())
        .filter(|t| !t.is_empty());
    Some((marker, run, tag))
}

fn is_closing(line: &str, marker: char, run: usize) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(|c| c == marker)
        && trimmed.chars().count() >= run
}

/// Collect every terminated fenced block in `text`
pub fn scan_fences(text: &str) -> FenceScan {
    let mut scan = FenceScan::default();
    let mut open: Option<(char, usize, Option<String>, usize)> = None;
    let mut body: Vec<&str> = Vec::new();

    for (i, raw) in text.split('\n').enumerate() {
        let line_no = i + 1;
        // `\r` only matters for fence detection; bodies keep it
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        let closes = open
            .as_ref()
            .map(|(marker, run, _, _)| is_closing(line, *marker, *run));

        match closes {
            None => {
                if let Some((marker, run, tag)) = parse_opening(line) {
                    open = Some((marker, run, tag, line_no));
                    body.clear();
                }
            }
            Some(true) => {
                if let Some((_, _, tag, start)) = open.take() {
                    scan.blocks.push(FencedBlock {
                        index: scan.blocks.len(),
                        tag,
                        content: body.join("\n"),
                        line: start,
                    });
                }
                body.clear();
            }
            Some(false) => body.push(raw),
        }
    }

    if let Some((_, _, _, start)) = open {
        scan.unterminated.push(start);
    }

    scan
}

/// Whether `content` starts with a recognised document root
pub fn has_document_root(content: &str) -> bool {
    let head: String = content
        .trim_start()
        .chars()
        .take(32)
        .collect::<String>()
        .to_lowercase();
    DOCUMENT_ROOT_MARKERS.iter().any(|m| head.starts_with(m))
}

/// Extracts the single artifact from an agent reply
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    expected_tags: Vec<String>,
    allow_bare_document: bool,
}

impl Default for ArtifactExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl ArtifactExtractor {
    pub fn new(expected_tags: Vec<String>) -> Self {
        Self {
            expected_tags: expected_tags.into_iter().map(|t| t.to_lowercase()).collect(),
            allow_bare_document: false,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.expected_tags.clone())
            .with_bare_document_fallback(config.allow_bare_document)
    }

    /// Accept an unfenced `<!DOCTYPE html>...</html>` when no block exists
    pub fn with_bare_document_fallback(mut self, allow: bool) -> Self {
        self.allow_bare_document = allow;
        self
    }

    fn is_expected_tag(&self, tag: Option<&str>) -> bool {
        tag.is_some_and(|t| self.expected_tags.iter().any(|e| e.eq_ignore_ascii_case(t)))
    }

    /// Extract the artifact from `raw_text`
    pub fn extract(&self, raw_text: &str) -> Result<Artifact> {
        self.extract_traced(raw_text).0
    }

    /// Extract the artifact and report each decision taken
    pub fn extract_traced(&self, raw_text: &str) -> (Result<Artifact>, Vec<String>) {
        let mut trace = Vec::new();
        let scan = scan_fences(raw_text);

        trace.push(format!("found {} fenced block(s)", scan.blocks.len()));
        for block in &scan.blocks {
            trace.push(format!("candidate {}", block.describe()));
        }
        for line in &scan.unterminated {
            trace.push(format!("ignored unterminated fence opened at line {}", line));
        }

        let result = match scan.blocks.len() {
            0 => self.extract_bare(raw_text, &mut trace),
            1 => {
                trace.push("single block selected".to_string());
                finish(&scan.blocks[0], &mut trace)
            }
            count => {
                let tagged: Vec<&FencedBlock> = scan
                    .blocks
                    .iter()
                    .filter(|b| self.is_expected_tag(b.tag.as_deref()))
                    .collect();

                if let [chosen] = tagged.as_slice() {
                    trace.push(format!(
                        "selected {} as the only block tagged {:?}",
                        chosen.describe(),
                        self.expected_tags
                    ));
                    finish(chosen, &mut trace)
                } else {
                    trace.push(format!(
                        "{} blocks carry an expected tag {:?}; refusing to choose",
                        tagged.len(),
                        self.expected_tags
                    ));
                    Err(HtoolError::MultipleArtifacts {
                        blocks: count,
                        tagged: tagged.len(),
                    })
                }
            }
        };

        (result, trace)
    }

    fn extract_bare(&self, raw_text: &str, trace: &mut Vec<String>) -> Result<Artifact> {
        if !self.allow_bare_document {
            return Err(HtoolError::NoArtifactFound);
        }

        let found = bare_document_regex().and_then(|re| re.find(raw_text));
        let Some(found) = found else {
            trace.push("no bare <!DOCTYPE html> document found either".to_string());
            return Err(HtoolError::NoArtifactFound);
        };

        trace.push(format!(
            "using bare document at bytes {}..{}",
            found.start(),
            found.end()
        ));
        let artifact = Artifact::new(found.as_str().trim(), None)
            .with_warning(ExtractionWarning::BareDocumentFallback);
        Ok(artifact)
    }
}

/// Trim, reject empty, validate the root marker
fn finish(block: &FencedBlock, trace: &mut Vec<String>) -> Result<Artifact> {
    let content = block.content.trim();
    if content.is_empty() {
        trace.push(format!("{} is empty", block.describe()));
        return Err(HtoolError::EmptyArtifact);
    }

    let mut artifact = Artifact::new(content, block.tag.clone());
    if !has_document_root(content) {
        trace.push("content lacks a <!DOCTYPE html>/<html> root".to_string());
        artifact = artifact.with_warning(ExtractionWarning::MissingDocumentRoot);
    }
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use htool_core::ErrorKind;

    const DOC: &str = "<!DOCTYPE html>\n<html>\n<body>hi</body>\n</html>";

    fn extractor() -> ArtifactExtractor {
        ArtifactExtractor::default()
    }

    #[test]
    fn test_single_html_block() {
        let reply = format!("Here is your tool:\n\n```html\n{}\n```\n\nEnjoy!", DOC);
        let artifact = extractor().extract(&reply).unwrap();
        assert_eq!(artifact.content, DOC);
        assert_eq!(artifact.declared_tag.as_deref(), Some("html"));
        assert!(artifact.warnings.is_empty());
    }

    #[test]
    fn test_single_untagged_block_is_trimmed() {
        let reply = format!("```\n\n   {}  \n\n```", DOC);
        let artifact = extractor().extract(&reply).unwrap();
        assert_eq!(artifact.content, DOC);
        assert!(artifact.declared_tag.is_none());
    }

    #[test]
    fn test_trimmed_length_matches_source_block() {
        let inner = "  <html>\n  <p>keep   inner   spacing</p>\n</html>\n\n";
        let reply = format!("```html\n{}```", inner);
        let artifact = extractor().extract(&reply).unwrap();
        assert_eq!(artifact.content.len(), inner.trim().len());
        assert_eq!(artifact.content, inner.trim());
    }

    #[test]
    fn test_no_blocks() {
        let reply = "Sorry, I cannot help with that.";
        let err = extractor().extract(reply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoArtifactFound);
    }

    #[test]
    fn test_bare_document_ignored_by_default() {
        let reply = format!("Here it is: {} done", DOC);
        let err = extractor().extract(&reply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoArtifactFound);
    }

    #[test]
    fn test_bare_document_fallback_when_enabled() {
        let reply = format!("Here it is:\n{}\nDone.", DOC);
        let artifact = extractor()
            .with_bare_document_fallback(true)
            .extract(&reply)
            .unwrap();
        assert_eq!(artifact.content, DOC);
        assert_eq!(
            artifact.warnings,
            vec![ExtractionWarning::BareDocumentFallback]
        );
    }

    #[test]
    fn test_empty_block() {
        let err = extractor().extract("```html\n   \n\n```").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyArtifact);
    }

    #[test]
    fn test_multiple_blocks_one_tagged_html() {
        let reply = format!(
            "Install:\n```bash\nnpm i\n```\nTool:\n```html\n{}\n```\nUsage:\n```\nopen it\n```",
            DOC
        );
        let (result, trace) = extractor().extract_traced(&reply);
        let artifact = result.unwrap();
        assert_eq!(artifact.content, DOC);
        assert!(trace.iter().any(|t| t.contains("selected block #2")));
    }

    #[test]
    fn test_multiple_blocks_none_tagged() {
        let reply = "```\n<html>a</html>\n```\n\n```js\nx()\n```";
        let err = extractor().extract(reply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MultipleArtifacts);
    }

    #[test]
    fn test_multiple_blocks_two_tagged() {
        let reply = format!("```html\n{}\n```\n```HTML\n{}\n```", DOC, DOC);
        let err = extractor().extract(&reply).unwrap_err();
        assert!(matches!(
            err,
            HtoolError::MultipleArtifacts {
                blocks: 2,
                tagged: 2
            }
        ));
    }

    #[test]
    fn test_missing_root_is_warning_not_error() {
        let artifact = extractor()
            .extract("```html\n<div>partial</div>\n```")
            .unwrap();
        assert_eq!(artifact.content, "<div>partial</div>");
        assert_eq!(artifact.warnings, vec![ExtractionWarning::MissingDocumentRoot]);
    }

    #[test]
    fn test_tilde_fence_and_longer_backtick_fence() {
        let reply = format!("~~~html\n{}\n~~~", DOC);
        assert_eq!(extractor().extract(&reply).unwrap().content, DOC);

        let nested = "````html\n<html>\n```\nnot a fence end\n```\n</html>\n````";
        let artifact = extractor().extract(nested).unwrap();
        assert!(artifact.content.contains("not a fence end"));
        assert!(artifact.content.ends_with("</html>"));
    }

    #[test]
    fn test_unterminated_fence_ignored() {
        let reply = "```html\n<html></html>\n";
        let (result, trace) = extractor().extract_traced(reply);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NoArtifactFound);
        assert!(trace.iter().any(|t| t.contains("unterminated")));
    }

    #[test]
    fn test_crlf_reply_keeps_line_endings() {
        let reply = "Intro\r\n```html\r\n<!DOCTYPE html>\r\n<html></html>\r\n```\r\n";
        let artifact = extractor().extract(reply).unwrap();
        assert_eq!(artifact.content, "<!DOCTYPE html>\r\n<html></html>");
    }

    #[test]
    fn test_crlf_block_length_matches_source() {
        let block = "<!DOCTYPE html>\r\n<html>\r\n<pre>a\r\nb</pre>\r\n</html>\r\n";
        let reply = format!("```html\r\n{}```", block);
        let artifact = extractor().extract(&reply).unwrap();
        assert_eq!(artifact.content.len(), block.trim().len());
        assert_eq!(artifact.content, block.trim());
    }

    #[test]
    fn test_scan_records_tags_and_lines() {
        let scan = scan_fences("a\n```python title\nx\n```\nb\n```\ny\n```");
        assert_eq!(scan.blocks.len(), 2);
        assert_eq!(scan.blocks[0].tag.as_deref(), Some("python"));
        assert_eq!(scan.blocks[0].line, 2);
        assert_eq!(scan.blocks[1].tag, None);
        assert_eq!(scan.blocks[1].content, "y");
    }

    #[test]
    fn test_document_root_detection() {
        assert!(has_document_root("  <!doctype HTML><html></html>"));
        assert!(has_document_root("<html lang=\"en\">"));
        assert!(!has_document_root("<div></div>"));
    }
}
