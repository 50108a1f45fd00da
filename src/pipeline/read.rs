//! Document reading: load a PDF's text layer and layout blocks via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a thread
//! designed for blocking operations, so Tokio worker threads never stall
//! while a large document is parsed.
//!
//! The read stage is the only place pdfium appears: it produces the
//! in-memory [`Document`] model and everything downstream is pure Rust
//! over that model.

use crate::error::Paper2SpeechError;
use crate::model::{BlockKind, Document, LayoutBlock, Page, Region};
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read the full document: raw metadata plus per-page text and layout
/// blocks.
pub async fn read_document(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Document, Paper2SpeechError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || read_document_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Paper2SpeechError::Internal(format!("read task panicked: {e}")))?
}

/// Blocking implementation of document reading.
fn read_document_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Document, Paper2SpeechError> {
    let pdfium = Pdfium::default();

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Paper2SpeechError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Paper2SpeechError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Paper2SpeechError::CorruptDocument {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let raw_metadata = collect_raw_metadata(&document);

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let text = match page.text() {
            Ok(text_page) => text_page.all(),
            Err(e) => {
                warn!("Page {}: text layer unavailable: {:?}", index + 1, e);
                String::new()
            }
        };

        let blocks = collect_blocks(&page);
        debug!(
            "Page {}: {} chars, {} layout blocks",
            index + 1,
            text.len(),
            blocks.len()
        );

        pages.push(Page {
            index,
            text,
            blocks,
        });
    }

    info!("Document loaded: {} pages", pages.len());

    Ok(Document {
        raw_metadata,
        pages,
    })
}

/// Collect typed layout blocks for one page, converting pdfium's
/// bottom-origin coordinates to the top-origin model space.
fn collect_blocks(page: &PdfPage) -> Vec<LayoutBlock> {
    let page_height = page.height().value;
    let mut blocks = Vec::new();

    for object in page.objects().iter() {
        let bounds = match object.bounds() {
            Ok(b) => b,
            Err(_) => continue,
        };
        let left = bounds.left().value;
        let right = bounds.right().value;
        let top = bounds.top().value;
        let bottom = bounds.bottom().value;
        let region = Region {
            x: left,
            y: page_height - top,
            width: right - left,
            height: top - bottom,
        };

        if let Some(text_object) = object.as_text_object() {
            let content = text_object.text();
            if content.trim().is_empty() {
                continue;
            }
            blocks.push(LayoutBlock {
                kind: BlockKind::Text,
                text: content,
                region,
                font_size: text_object.unscaled_font_size().value,
            });
        } else if object.as_image_object().is_some() {
            blocks.push(LayoutBlock {
                kind: BlockKind::Image,
                text: String::new(),
                region,
                font_size: 0.0,
            });
        }
    }

    blocks
}

/// Collect the source-format metadata tags verbatim into an opaque map.
fn collect_raw_metadata(document: &PdfDocument) -> HashMap<String, String> {
    let metadata = document.metadata();
    let mut raw = HashMap::new();

    let tags = [
        ("Title", PdfDocumentMetadataTagType::Title),
        ("Author", PdfDocumentMetadataTagType::Author),
        ("Subject", PdfDocumentMetadataTagType::Subject),
        ("Keywords", PdfDocumentMetadataTagType::Keywords),
        ("Creator", PdfDocumentMetadataTagType::Creator),
        ("Producer", PdfDocumentMetadataTagType::Producer),
        ("CreationDate", PdfDocumentMetadataTagType::CreationDate),
        ("ModificationDate", PdfDocumentMetadataTagType::ModificationDate),
    ];

    for (key, tag) in tags {
        if let Some(entry) = metadata.get(tag) {
            let value = entry.value().to_string();
            if !value.is_empty() {
                raw.insert(key.to_string(), value);
            }
        }
    }

    raw
}
