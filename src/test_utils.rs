pub mod test_helpers {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    use crate::pdf::{PageSize, PageSource, RenderEngine, RenderFault, Surface, check_page};

    /// Letter-sized page in PDF points
    pub const LETTER: PageSize = PageSize::new(612.0, 792.0);

    #[derive(Clone, Debug, Default)]
    struct FakeDocument {
        pages: Vec<PageSize>,
        failing_pages: HashSet<usize>,
        fetch_delay: Duration,
        render_delay: Duration,
        renders: Arc<Mutex<Vec<(usize, f32)>>>,
    }

    /// In-memory engine serving fake documents by URL.
    ///
    /// Rendered surfaces are flat gray images with the exact pixel size of the
    /// page at the requested scale. Unknown URLs fail to fetch.
    #[derive(Clone, Default)]
    pub struct FakeEngine {
        docs: HashMap<String, FakeDocument>,
        fetches: Arc<Mutex<Vec<String>>>,
        renders: Arc<Mutex<Vec<(usize, f32)>>>,
    }

    impl FakeEngine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a document with the given page sizes
        pub fn with_document(mut self, url: &str, pages: &[PageSize]) -> Self {
            self.docs.insert(
                url.to_string(),
                FakeDocument {
                    pages: pages.to_vec(),
                    ..FakeDocument::default()
                },
            );
            self
        }

        /// Make fetching `url` take `delay`
        pub fn with_fetch_delay(mut self, url: &str, delay: Duration) -> Self {
            if let Some(doc) = self.docs.get_mut(url) {
                doc.fetch_delay = delay;
            }
            self
        }

        /// Make every page render of `url` take `delay`
        pub fn with_render_delay(mut self, url: &str, delay: Duration) -> Self {
            if let Some(doc) = self.docs.get_mut(url) {
                doc.render_delay = delay;
            }
            self
        }

        /// Make `page` of `url` fail to render
        pub fn with_failing_page(mut self, url: &str, page: usize) -> Self {
            if let Some(doc) = self.docs.get_mut(url) {
                doc.failing_pages.insert(page);
            }
            self
        }

        /// URLs fetched so far, in order
        pub fn fetches(&self) -> Vec<String> {
            self.fetches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Pages rendered so far with their scale, in order
        pub fn renders(&self) -> Vec<(usize, f32)> {
            self.renders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn into_engine(self) -> Arc<dyn RenderEngine> {
            Arc::new(self)
        }
    }

    impl RenderEngine for FakeEngine {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, RenderFault> {
            self.fetches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_string());

            let doc = self
                .docs
                .get(url)
                .ok_or_else(|| RenderFault::fetch(url, "not found"))?;
            if !doc.fetch_delay.is_zero() {
                std::thread::sleep(doc.fetch_delay);
            }
            Ok(url.as_bytes().to_vec())
        }

        fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn PageSource>, RenderFault> {
            let url = String::from_utf8(bytes).map_err(|e| RenderFault::generic(e.to_string()))?;
            let mut doc = self
                .docs
                .get(&url)
                .cloned()
                .ok_or_else(|| RenderFault::generic(format!("cannot parse {url}")))?;
            doc.renders = Arc::clone(&self.renders);
            Ok(Box::new(doc))
        }
    }

    impl FakeDocument {
        fn page_size(&self, page: usize) -> Result<PageSize, RenderFault> {
            check_page(page, self.pages.len())?;
            Ok(self.pages[page - 1])
        }
    }

    impl PageSource for FakeDocument {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn render(&self, page: usize, scale: f32) -> Result<Surface, RenderFault> {
            let size = self.page_size(page)?;
            if !self.render_delay.is_zero() {
                std::thread::sleep(self.render_delay);
            }
            self.renders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((page, scale));
            if self.failing_pages.contains(&page) {
                return Err(RenderFault::generic(format!("page {page} is corrupt")));
            }

            let (width_px, height_px) = size.scaled(scale);
            Ok(Surface {
                pixels: vec![0x80; (width_px * height_px * 3) as usize],
                width_px,
                height_px,
                page,
                scale,
            })
        }
    }
}
