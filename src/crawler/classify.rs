// src/crawler/classify.rs

//! Heuristic classification of crawled links and context text.
//!
//! Pure functions over text, kept out of the traversal logic so each
//! table can be tested exhaustively on its own.

use regex::Regex;

use crate::models::{DocumentLanguage, DocumentType, FileType};
use crate::utils::url_path;

const CURRICULUM_KEYWORDS: &[&str] = &[
    "curriculum",
    "expectations",
    "grade",
    "kindergarten",
    "math",
    "mathematics",
    "language",
    "science",
    "social studies",
    "french",
    "arts",
    "health",
    "physical education",
    "learning outcomes",
    "course of study",
    "programme",
];

const EXCLUSION_KEYWORDS: &[&str] = &[
    "newsletter",
    "registration form",
    "permission form",
    "privacy policy",
    "terms of use",
    "accessibility policy",
    "media release",
    "job posting",
    "tender",
    "meeting minutes",
];

const DOCUMENT_HREF_PATTERNS: &[&str] = &[".pdf", ".docx", ".doc", "download", "resource", "attachment"];

/// Whether an href looks like it points at a document rather than a page.
pub fn has_document_pattern(href: &str) -> bool {
    let lower = href.to_lowercase();
    DOCUMENT_HREF_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Whether link text or surrounding context mentions curriculum content.
pub fn has_curriculum_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    CURRICULUM_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whether the text matches a known non-curriculum page family.
pub fn has_exclusion_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    EXCLUSION_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// A link qualifies as a candidate document when it looks like a document,
/// mentions curriculum content, and matches no exclusion family.
pub fn is_document_candidate(href: &str, context: &str) -> bool {
    has_document_pattern(href) && has_curriculum_keyword(context) && !has_exclusion_keyword(context)
}

/// Whether anchor text suggests a navigational page worth descending into.
pub fn is_navigational_candidate(text: &str) -> bool {
    has_curriculum_keyword(text) && !has_exclusion_keyword(text)
}

/// Extract a grade from context text.
///
/// Handles "grade 4", "gr. 4", "4th grade", "year 4", and kindergarten
/// synonyms (grade 0).
pub fn extract_grade(text: &str) -> Option<u8> {
    let patterns = [
        r"(?i)\bgrade\s*(\d{1,2})\b",
        r"(?i)\bgr\.?\s*(\d{1,2})\b",
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)[\s-]+grade\b",
        r"(?i)\byear\s*(\d{1,2})\b",
    ];
    for pattern in patterns {
        let re = Regex::new(pattern).expect("static regex");
        if let Some(caps) = re.captures(text) {
            if let Ok(grade) = caps[1].parse::<u8>() {
                if grade <= 12 {
                    return Some(grade);
                }
            }
        }
    }

    let kinder = Regex::new(r"(?i)\bkindergarten\b|\bmaternelle\b|\bjk\b|\bsk\b")
        .expect("static regex");
    if kinder.is_match(text) {
        return Some(0);
    }
    None
}

/// Classify the subject from context text, if any keyword matches.
pub fn classify_subject(text: &str) -> Option<String> {
    const TABLE: &[(&[&str], &str)] = &[
        (&["math", "mathématiques", "numeracy"], "math"),
        (&["language arts", "language", "literacy", "english", "writing", "reading"], "language"),
        (&["science", "sciences", "biology", "chemistry", "physics"], "science"),
        (&["social studies", "history", "geography", "civics"], "social_studies"),
        (&["french", "français", "fsl", "core french", "immersion"], "french"),
        (&["the arts", "visual arts", "music", "drama", "dance"], "arts"),
        (&["health", "physical education", "phys ed"], "health_pe"),
        (&["technology", "computer studies", "coding"], "technology"),
    ];

    let lower = text.to_lowercase();
    for (keywords, canonical) in TABLE {
        if keywords.iter().any(|k| lower.contains(k)) {
            return Some((*canonical).to_string());
        }
    }
    None
}

/// Classify the document's role. Defaults to curriculum.
pub fn classify_document_type(text: &str) -> DocumentType {
    const TABLE: &[(&[&str], DocumentType)] = &[
        (
            &["assessment", "exemplar", "evaluation", "achievement chart"],
            DocumentType::Assessment,
        ),
        (
            &["resource", "support material", "teacher guide", "sample"],
            DocumentType::Resource,
        ),
        (
            &["guideline", "policy", "framework", "growing success"],
            DocumentType::Guideline,
        ),
    ];

    let lower = text.to_lowercase();
    for (keywords, kind) in TABLE {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *kind;
        }
    }
    DocumentType::Curriculum
}

/// Classify file type from the URL extension.
pub fn classify_file_type(url: &str) -> FileType {
    let path = url_path(url);
    if path.ends_with(".pdf") {
        FileType::Pdf
    } else if path.ends_with(".docx") || path.ends_with(".doc") {
        FileType::Docx
    } else if path.ends_with(".html") || path.ends_with(".htm") {
        FileType::Html
    } else {
        FileType::Unknown
    }
}

/// Detect the document language from URL and context text.
///
/// French indicators win; otherwise English is the default.
pub fn detect_language(url: &str, text: &str) -> DocumentLanguage {
    let combined = format!("{} {}", url.to_lowercase(), text.to_lowercase());

    let bilingual = Regex::new(r"(?i)\bbilingual\b|\bbilingue\b").expect("static regex");
    if bilingual.is_match(&combined) {
        return DocumentLanguage::Both;
    }

    let french = Regex::new(
        r"(?i)/fr/|\bfrançais\b|\bfrancais\b|\bmaternelle\b|\bprogramme-cadre\b|\bétude\b",
    )
    .expect("static regex");
    if french.is_match(&combined) {
        return DocumentLanguage::Fr;
    }

    DocumentLanguage::En
}
