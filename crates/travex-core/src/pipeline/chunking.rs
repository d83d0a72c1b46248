//! Grouping pages into chunks for AI extraction.

use crate::layout::PageText;
use crate::models::ChunkConfig;

/// A run of consecutive pages sent to the AI extractor in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// 0-based position of the chunk in the document.
    pub index: usize,
    /// 1-based number of the first page in the chunk.
    pub first_page: usize,
    pub pages: Vec<PageText>,
}

impl DocumentChunk {
    /// 1-based number of the last page in the chunk.
    pub fn last_page(&self) -> usize {
        self.first_page + self.pages.len().saturating_sub(1)
    }

    /// Text of all pages, separated by blank lines.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(PageText::text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Pages per chunk for a document of `page_count` pages.
pub fn pages_per_chunk(page_count: usize, config: &ChunkConfig) -> usize {
    if page_count <= config.single_chunk_max_pages {
        page_count.max(1)
    } else if page_count <= config.medium_max_pages {
        config.medium_pages_per_chunk.max(1)
    } else {
        config.large_pages_per_chunk.max(1)
    }
}

/// Split pages into chunks. Every page lands in exactly one chunk, in order.
pub fn plan_chunks(pages: Vec<PageText>, config: &ChunkConfig) -> Vec<DocumentChunk> {
    let size = pages_per_chunk(pages.len(), config);
    let mut chunks = Vec::new();
    let mut pages = pages.into_iter().peekable();

    while pages.peek().is_some() {
        let index = chunks.len();
        chunks.push(DocumentChunk {
            index,
            first_page: index * size + 1,
            pages: pages.by_ref().take(size).collect(),
        });
    }

    chunks
}
