//! Document parsing and rasterization capability
//!
//! The render worker only talks to [`RenderEngine`] and [`PageSource`]:
//! fetch by URL, open bytes, ask for page count, render a page at a scale.
//! [`MupdfEngine`] is the production implementation.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::debug;

use super::request::RenderFault;
use super::types::Surface;

/// Upper bound on a fetched document body
pub const MAX_DOCUMENT_BYTES: u64 = 256 * 1024 * 1024;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// An opened document. Page numbers are 1-indexed.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Rasterize `page` at `scale` (1.0 = one pixel per document unit)
    fn render(&self, page: usize, scale: f32) -> Result<Surface, RenderFault>;
}

/// Fetches and opens documents.
///
/// `open` runs on the worker thread, so the returned source does not need to
/// be `Send`.
pub trait RenderEngine: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, RenderFault>;

    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn PageSource>, RenderFault>;
}

/// Fetch a document body from `http(s)://`, `file://` or a plain path.
///
/// Bodies larger than [`MAX_DOCUMENT_BYTES`] are rejected, never truncated.
pub fn fetch_document(url: &str) -> Result<Vec<u8>, RenderFault> {
    if url.starts_with("http://") || url.starts_with("https://") {
        debug!("Fetching {url} over HTTP");
        let resp = ureq::agent()
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .call()
            .map_err(|e| RenderFault::fetch(url, e))?;

        let declared = resp
            .header("Content-Length")
            .and_then(|len| len.trim().parse::<u64>().ok());
        if let Some(len) = declared {
            check_size(url, len, MAX_DOCUMENT_BYTES)?;
        }
        return read_limited(url, resp.into_reader(), MAX_DOCUMENT_BYTES);
    }

    let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
    debug!("Reading {path:?}");
    let file = File::open(path).map_err(|e| RenderFault::fetch(url, e))?;
    if let Ok(meta) = file.metadata() {
        check_size(url, meta.len(), MAX_DOCUMENT_BYTES)?;
    }
    read_limited(url, file, MAX_DOCUMENT_BYTES)
}

fn check_size(url: &str, len: u64, limit: u64) -> Result<(), RenderFault> {
    if len > limit {
        Err(RenderFault::fetch(
            url,
            format!("document is {len} bytes, limit is {limit}"),
        ))
    } else {
        Ok(())
    }
}

/// Read at most `limit` bytes, failing when the body is longer
fn read_limited(url: &str, reader: impl Read, limit: u64) -> Result<Vec<u8>, RenderFault> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| RenderFault::fetch(url, e))?;

    if bytes.len() as u64 > limit {
        return Err(RenderFault::fetch(
            url,
            format!("document exceeds {limit} bytes"),
        ));
    }
    Ok(bytes)
}

/// Check that a 1-indexed page number is inside the document
pub fn check_page(page: usize, page_count: usize) -> Result<(), RenderFault> {
    if page == 0 || page > page_count {
        Err(RenderFault::PageOutOfRange { page, page_count })
    } else {
        Ok(())
    }
}

#[cfg(feature = "pdf")]
pub use self::mupdf_engine::MupdfEngine;

#[cfg(feature = "pdf")]
mod mupdf_engine {
    use mupdf::{Colorspace, Document, Matrix, Pixmap};

    use super::{PageSource, RenderEngine, check_page, fetch_document};
    use crate::pdf::request::RenderFault;
    use crate::pdf::types::Surface;

    const PDF_MAGIC: &str = "application/pdf";

    /// MuPDF-backed engine
    #[derive(Clone, Copy, Debug, Default)]
    pub struct MupdfEngine;

    impl RenderEngine for MupdfEngine {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, RenderFault> {
            fetch_document(url)
        }

        fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn PageSource>, RenderFault> {
            let doc = Document::from_bytes(&bytes, PDF_MAGIC)?;
            let page_count = doc.page_count()?.max(0) as usize;
            Ok(Box::new(MupdfPages { doc, page_count }))
        }
    }

    struct MupdfPages {
        doc: Document,
        page_count: usize,
    }

    impl PageSource for MupdfPages {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn render(&self, page: usize, scale: f32) -> Result<Surface, RenderFault> {
            check_page(page, self.page_count)?;
            let handle = self.doc.load_page((page - 1) as i32)?;

            let rgb = Colorspace::device_rgb();
            let pixmap = handle.to_pixmap(&Matrix::new_scale(scale, scale), &rgb, false, false)?;
            let pixels = pixmap_to_rgb(&pixmap)?;

            Ok(Surface {
                pixels,
                width_px: pixmap.width(),
                height_px: pixmap.height(),
                page,
                scale,
            })
        }
    }

    fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, RenderFault> {
        let n = pixmap.n() as usize;
        if n < 3 {
            return Err(RenderFault::generic(format!(
                "Unsupported pixmap format: {n} channels"
            )));
        }

        let width = pixmap.width() as usize;
        let height = pixmap.height() as usize;
        let stride = pixmap.stride() as usize;
        let samples = pixmap.samples();
        let row_bytes = width * n;
        if stride == 0 || samples.len() < stride.saturating_mul(height) || row_bytes > stride {
            return Err(RenderFault::generic("Pixmap buffer size mismatch"));
        }

        let mut out = Vec::with_capacity(width * height * 3);
        for row in samples.chunks(stride).take(height) {
            let row = &row[..row_bytes];
            if n == 3 {
                out.extend_from_slice(row);
            } else {
                for px in row.chunks_exact(n) {
                    out.extend_from_slice(&px[..3]);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_page_is_one_indexed() {
        assert!(check_page(0, 3).is_err());
        assert!(check_page(1, 3).is_ok());
        assert!(check_page(3, 3).is_ok());
        assert!(matches!(
            check_page(4, 3),
            Err(RenderFault::PageOutOfRange {
                page: 4,
                page_count: 3
            })
        ));
    }

    #[test]
    fn fetch_reads_plain_and_file_urls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").expect("write");

        let plain = fetch_document(path.to_str().expect("utf8 path")).expect("plain path");
        assert_eq!(plain, b"%PDF-1.4 test");

        let url = format!("file://{}", path.display());
        assert_eq!(fetch_document(&url).expect("file url"), plain);
    }

    #[test]
    fn oversized_body_is_rejected_not_truncated() {
        let body = vec![7u8; 16];

        let exact = read_limited("mem://doc", body.as_slice(), 16).expect("at the limit");
        assert_eq!(exact.len(), 16);

        let err = read_limited("mem://doc", body.as_slice(), 15).unwrap_err();
        assert!(matches!(err, RenderFault::Fetch { ref detail, .. } if detail.contains("exceeds")));
    }

    #[test]
    fn declared_size_over_limit_is_rejected() {
        assert!(check_size("mem://doc", 10, 10).is_ok());
        assert!(matches!(
            check_size("mem://doc", 11, 10),
            Err(RenderFault::Fetch { .. })
        ));
    }

    #[test]
    fn fetch_missing_file_is_fetch_error() {
        let err = fetch_document("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, RenderFault::Fetch { .. }));
    }
}
