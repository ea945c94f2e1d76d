//! Text extraction: PDF bytes → one string of page text.
//!
//! ## Page policy
//!
//! A page that cannot be decoded contributes an empty string and is recorded
//! in [`ExtractedText::failed_pages`]; it never aborts the document. Only a
//! byte stream that is not a PDF at all fails the whole extraction.
//!
//! Pages are concatenated in document order with nothing in between. lopdf
//! ends every text block with `\n`, so its pages stay apart; a backend that
//! returns bare page text (pdfium) can glue the last word of one page to the
//! first word of the next.
//!
//! ## Backends
//!
//! [`TextBackend`] hides the PDF library. [`LopdfBackend`] is pure Rust and
//! works on in-memory bytes; the `pdfium` feature adds [`PdfiumBackend`].
//! Parsing is CPU-bound, so [`extract_text`] runs it under
//! `tokio::task::spawn_blocking`.

use crate::config::ExtractionBackend;
use crate::error::{ExtractionError, GuardError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Per-page result from a backend: the page text or a decode error message.
pub type PageText = Result<String, String>;

/// A library that can split a PDF into per-page text.
pub trait TextBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read every page in document order.
    ///
    /// Returns `Err` only when the document as a whole cannot be opened.
    fn read_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, GuardError>;
}

/// Text of a whole document plus what went wrong on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// All page text, concatenated without separators.
    pub text: String,
    pub page_count: usize,
    /// One [`ExtractionError::PageDecodeFailure`] per page the backend could not
    /// decode. A page that decodes to an empty string is not listed.
    pub failed_pages: Vec<ExtractionError>,
}

impl ExtractedText {
    pub fn failed_page_count(&self) -> usize {
        self.failed_pages.len()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// How far into the file the `%PDF` header may start.
const HEADER_WINDOW: usize = 1024;

/// Check the `%PDF` magic before handing bytes to a parser.
///
/// Readers tolerate leading junk, so the header may sit anywhere in the
/// first [`HEADER_WINDOW`] bytes.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), ExtractionError> {
    let window = &bytes[..bytes.len().min(HEADER_WINDOW)];
    if !window.windows(4).any(|w| w == b"%PDF") {
        let n = bytes.len().min(4);
        return Err(ExtractionError::InvalidFormat {
            detail: format!("missing %PDF header (first bytes: {:?})", &bytes[..n]),
        });
    }
    Ok(())
}

/// Fold per-page results into an [`ExtractedText`], applying the page policy.
pub fn assemble_pages(pages: Vec<PageText>) -> ExtractedText {
    let page_count = pages.len();
    let mut text = String::new();
    let mut failed_pages = Vec::new();

    for (page_index, page) in pages.into_iter().enumerate() {
        match page {
            Ok(t) => text.push_str(&t),
            Err(detail) => {
                warn!("Page {}: text extraction failed: {}", page_index + 1, detail);
                failed_pages.push(ExtractionError::PageDecodeFailure { page_index, detail });
            }
        }
    }

    ExtractedText {
        text,
        page_count,
        failed_pages,
    }
}

/// Extract text synchronously with the given backend.
pub fn extract_with(backend: &dyn TextBackend, bytes: &[u8]) -> Result<ExtractedText, GuardError> {
    check_pdf_magic(bytes)?;
    let pages = backend.read_pages(bytes)?;
    let extracted = assemble_pages(pages);
    info!(
        "Extracted {} chars from {} pages via {} ({} failed)",
        extracted.char_count(),
        extracted.page_count,
        backend.name(),
        extracted.failed_page_count()
    );
    Ok(extracted)
}

/// Instantiate the backend selected in the config.
pub fn backend_for(kind: ExtractionBackend) -> Result<Box<dyn TextBackend>, GuardError> {
    match kind {
        ExtractionBackend::Lopdf => Ok(Box::new(LopdfBackend)),
        #[cfg(feature = "pdfium")]
        ExtractionBackend::Pdfium => Ok(Box::new(PdfiumBackend)),
        #[cfg(not(feature = "pdfium"))]
        ExtractionBackend::Pdfium => Err(GuardError::BackendUnavailable {
            backend: "pdfium".to_string(),
            detail: "rebuild with `--features pdfium`".to_string(),
        }),
    }
}

/// Extract text off the async executor.
pub async fn extract_text(
    bytes: Vec<u8>,
    kind: ExtractionBackend,
) -> Result<ExtractedText, GuardError> {
    let backend = backend_for(kind)?;
    tokio::task::spawn_blocking(move || extract_with(backend.as_ref(), &bytes))
        .await
        .map_err(|e| GuardError::Internal(format!("Extraction task panicked: {}", e)))?
}

// ── lopdf ────────────────────────────────────────────────────────────────

/// Pure-Rust backend built on `lopdf`.
pub struct LopdfBackend;

impl TextBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn read_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, GuardError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::InvalidFormat {
            detail: e.to_string(),
        })?;

        // get_pages is keyed by 1-indexed page number, so iteration is in document order.
        let pages = doc.get_pages();
        debug!("lopdf: {} pages", pages.len());

        Ok(pages
            .keys()
            .map(|&page_num| doc.extract_text(&[page_num]).map_err(|e| e.to_string()))
            .collect())
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Backend built on `pdfium-render`.
///
/// Binds to the library at `PDFIUM_LIB_PATH` when set, otherwise to the
/// system library.
#[cfg(feature = "pdfium")]
pub struct PdfiumBackend;

#[cfg(feature = "pdfium")]
impl TextBackend for PdfiumBackend {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn read_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, GuardError> {
        use pdfium_render::prelude::*;

        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
            _ => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| GuardError::BackendUnavailable {
            backend: "pdfium".to_string(),
            detail: format!("{:?}", e),
        })?;
        let pdfium = Pdfium::new(bindings);

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| ExtractionError::InvalidFormat {
                detail: format!("{:?}", e),
            })?;

        let pages = document
            .pages()
            .iter()
            .map(|page| {
                page.text()
                    .map(|t| t.all())
                    .map_err(|e| format!("{:?}", e))
            })
            .collect();
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Document, Object, Stream};
    use proptest::prelude::*;

    /// Backend that returns canned pages, for exercising the page policy.
    struct FakeBackend(Vec<PageText>);

    impl TextBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn read_pages(&self, _bytes: &[u8]) -> Result<Vec<PageText>, GuardError> {
            Ok(self.0.clone())
        }
    }

    /// A minimal N-page PDF with one text run per page.
    fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page_ids = Vec::new();

        for page_num in 0..num_pages {
            let content_id = doc.new_object_id();
            let page_id = doc.new_object_id();
            let content = format!("BT /F1 12 Tf 50 700 Td (Clause-{}) Tj ET", page_num + 1);
            doc.objects.insert(
                content_id,
                Object::Stream(Stream::new(Dictionary::new(), content.into_bytes())),
            );

            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("Contents", Object::Reference(content_id));
            page.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            );
            doc.objects.insert(page_id, Object::Dictionary(page));
            page_ids.push(Object::Reference(page_id));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(num_pages as i64));
        pages.set("Kids", Object::Array(page_ids));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn non_pdf_bytes_are_invalid_format() {
        let err = check_pdf_magic(b"PK\x03\x04zip").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidFormat { .. }));
        assert!(check_pdf_magic(b"%P").is_err());
        assert!(check_pdf_magic(b"").is_err());
        assert!(check_pdf_magic(b"%PDF-1.7").is_ok());
    }

    #[test]
    fn header_may_follow_leading_junk() {
        let mut bytes = vec![b' '; 500];
        bytes.extend_from_slice(b"%PDF-1.4\n");
        assert!(check_pdf_magic(&bytes).is_ok());

        let mut late = vec![b' '; HEADER_WINDOW];
        late.extend_from_slice(b"%PDF-1.4\n");
        assert!(check_pdf_magic(&late).is_err());
    }

    #[test]
    fn pages_are_concatenated_without_separators() {
        let backend = FakeBackend(vec![Ok("The ten".into()), Ok("ant pays".into())]);
        let out = extract_with(&backend, b"%PDF-1.5").unwrap();
        assert_eq!(out.text, "The tenant pays");
        assert_eq!(out.page_count, 2);
        assert!(out.failed_pages.is_empty());
    }

    #[test]
    fn failed_page_contributes_empty_text_and_is_counted() {
        let backend = FakeBackend(vec![
            Ok("A".into()),
            Err("bad stream".into()),
            Ok("C".into()),
        ]);
        let out = extract_with(&backend, b"%PDF-1.5").unwrap();
        assert_eq!(out.text, "AC");
        assert_eq!(out.page_count, 3);
        assert_eq!(
            out.failed_pages,
            vec![ExtractionError::PageDecodeFailure {
                page_index: 1,
                detail: "bad stream".into()
            }]
        );
    }

    #[test]
    fn zero_page_document_is_empty_not_an_error() {
        let out = extract_with(&FakeBackend(vec![]), b"%PDF-1.5").unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.page_count, 0);
    }

    #[test]
    fn all_pages_failed_is_empty_not_an_error() {
        let backend = FakeBackend(vec![Err("x".into()), Err("y".into())]);
        let out = extract_with(&backend, b"%PDF-1.5").unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.failed_page_count(), 2);
    }

    #[test]
    fn magic_is_checked_before_backend() {
        let backend = FakeBackend(vec![Ok("never read".into())]);
        let err = extract_with(&backend, b"hello").unwrap_err();
        assert!(matches!(
            err,
            GuardError::Extraction(ExtractionError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn lopdf_reads_every_page() {
        let pdf = create_test_pdf(3);
        let out = extract_with(&LopdfBackend, &pdf).unwrap();
        assert_eq!(out.text, "Clause-1\nClause-2\nClause-3\n");
        assert_eq!(out.page_count, 3);
        assert!(out.failed_pages.is_empty());
    }

    #[test]
    fn lopdf_rejects_truncated_pdf() {
        let err = extract_with(&LopdfBackend, b"%PDF-1.5\ngarbage with no xref").unwrap_err();
        assert!(matches!(
            err,
            GuardError::Extraction(ExtractionError::InvalidFormat { .. })
        ));
    }

    #[tokio::test]
    async fn async_extraction_uses_selected_backend() {
        let pdf = create_test_pdf(2);
        let out = extract_text(pdf, ExtractionBackend::Lopdf).await.unwrap();
        assert_eq!(out.page_count, 2);
        assert_eq!(out.text, "Clause-1\nClause-2\n");
    }

    #[cfg(not(feature = "pdfium"))]
    #[test]
    fn pdfium_without_feature_is_a_config_error() {
        let err = backend_for(ExtractionBackend::Pdfium).err().unwrap();
        assert!(matches!(err, GuardError::BackendUnavailable { .. }));
    }

    proptest! {
        #[test]
        fn concatenation_preserves_document_order(pages in proptest::collection::vec("[a-z ]{0,20}", 0..8)) {
            let backend = FakeBackend(pages.iter().cloned().map(Ok).collect());
            let out = extract_with(&backend, b"%PDF-1.5").unwrap();
            prop_assert_eq!(out.text, pages.concat());
            prop_assert_eq!(out.page_count, pages.len());
        }
    }
}
