//! Barcode extraction from printed label documents.

use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::errors::{AutomationError, AutomationResult};

/// Labelled 16-character forms first, then any 16-character run
pub const DEFAULT_PATTERNS: &[&str] = &[
    r"物流條碼：\s*(\w{16})",
    r"物流條碼[：:]\s*(\w{16})",
    r"物流條碼\s*[：:]\s*(\w{16})",
    r"條碼[：:]\s*(\w{16})",
    r"(\w{16})",
    r"[A-Z0-9]{16}",
];

/// Result of running the pattern list over a document's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Deduplicated, lexically sorted
    pub barcodes: Vec<String>,
    /// The pattern that produced `barcodes`, if any did
    pub matched_pattern: Option<String>,
    /// Full concatenated text, kept for diagnostics
    pub text: String,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }
}

/// Ordered list of candidate patterns; the first one with any match wins
#[derive(Debug, Clone)]
pub struct BarcodeExtractor {
    patterns: Vec<Regex>,
}

impl BarcodeExtractor {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> AutomationResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    AutomationError::Extraction(format!("invalid pattern {}: {}", p.as_ref(), e))
                })
            })
            .collect::<AutomationResult<Vec<_>>>()?;
        if patterns.is_empty() {
            return Err(AutomationError::Extraction(
                "at least one barcode pattern is required".to_string(),
            ));
        }
        Ok(Self { patterns })
    }

    /// Apply the patterns to already-decoded text.
    ///
    /// Patterns with a capture group contribute group 1, others the whole match.
    pub fn extract_from_text(&self, text: &str) -> Extraction {
        for pattern in &self.patterns {
            let found: BTreeSet<String> = pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| m.as_str().to_string())
                .collect();

            if !found.is_empty() {
                info!("Pattern {} matched {} barcode(s)", pattern.as_str(), found.len());
                return Extraction {
                    barcodes: found.into_iter().collect(),
                    matched_pattern: Some(pattern.as_str().to_string()),
                    text: text.to_string(),
                };
            }
        }

        debug!("No pattern matched {} chars of text", text.chars().count());
        Extraction {
            barcodes: Vec::new(),
            matched_pattern: None,
            text: text.to_string(),
        }
    }

    /// Decode a PDF and extract barcodes from its text
    pub fn extract_identifiers(&self, pdf: &[u8]) -> AutomationResult<Extraction> {
        let text = pdf_page_texts(pdf)?.join("\n");
        Ok(self.extract_from_text(&text))
    }
}

/// Text of every page that yields any, in page order
pub fn pdf_page_texts(pdf: &[u8]) -> AutomationResult<Vec<String>> {
    let document = lopdf::Document::load_mem(pdf)
        .map_err(|e| AutomationError::Extraction(format!("not a readable PDF: {}", e)))?;

    let pages = document.get_pages();
    debug!("PDF has {} page(s)", pages.len());

    let mut texts = Vec::new();
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => texts.push(text),
            Ok(_) => debug!("Page {} has no text", page_number),
            Err(e) => debug!("Page {} text extraction failed: {}", page_number, e),
        }
    }
    Ok(texts)
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod extract_test;
