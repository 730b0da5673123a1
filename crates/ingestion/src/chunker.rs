//! Text chunking module
//!
//! Splits text into overlapping chunks for embedding. Two strategies:
//! - `recursive`: separator-driven splitting that keeps every chunk an
//!   exact span of the input, so chunks can be stitched back together
//! - `semantic`: `text-splitter` boundaries (Markdown-aware for `.md` sources)
//!
//! Lengths are measured in characters.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use convorag_common::config::ChunkingConfig;
use convorag_common::models::{Chunk, Metadata};
use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};
use tracing::debug;

use crate::errors::IngestionError;

/// Separators tried in order, coarsest first. Reaching the empty
/// separator means the piece is a single token and is kept whole.
pub const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// How a document is cut into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkingStrategy {
    #[default]
    Recursive,
    Semantic,
}

impl FromStr for ChunkingStrategy {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recursive" => Ok(ChunkingStrategy::Recursive),
            "semantic" => Ok(ChunkingStrategy::Semantic),
            other => Err(IngestionError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkingStrategy::Recursive => f.write_str("recursive"),
            ChunkingStrategy::Semantic => f.write_str("semantic"),
        }
    }
}

/// A text chunk with its position in the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk content
    pub content: String,
    /// Index of this chunk in the document
    pub index: usize,
    /// Start byte position in original text
    pub start_pos: usize,
    /// End byte position in original text (exclusive)
    pub end_pos: usize,
}

/// Validated chunking settings
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    strategy: ChunkingStrategy,
}

impl Chunker {
    /// Build a chunker from configuration, rejecting unusable settings
    pub fn new(config: &ChunkingConfig) -> Result<Self, IngestionError> {
        let strategy = config.strategy.parse()?;
        Self::with_sizes(config.chunk_size, config.chunk_overlap, strategy)
    }

    pub fn with_sizes(
        chunk_size: usize,
        chunk_overlap: usize,
        strategy: ChunkingStrategy,
    ) -> Result<Self, IngestionError> {
        if chunk_size == 0 {
            return Err(IngestionError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestionError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, chunk_overlap, strategy })
    }

    /// Same sizes, different strategy
    pub fn with_strategy(&self, strategy: ChunkingStrategy) -> Self {
        Self { strategy, ..self.clone() }
    }

    pub fn strategy(&self) -> ChunkingStrategy {
        self.strategy
    }

    /// Split text into positioned chunks. Blank input yields no chunks.
    ///
    /// Whitespace-only spans are folded into the preceding chunk (or the
    /// following one at the start of the text), so every chunk has content
    /// and chunks still tile the input.
    pub fn split(&self, text: &str, source: &str) -> Result<Vec<TextChunk>, IngestionError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let spans = match self.strategy {
            ChunkingStrategy::Recursive => self.recursive_spans(text),
            ChunkingStrategy::Semantic => self.semantic_spans(text, source)?,
        };
        let spans = fold_blank_spans(text, spans);

        debug!(
            input_len = text.len(),
            chunk_count = spans.len(),
            chunk_size = self.chunk_size,
            strategy = %self.strategy,
            "Text chunked"
        );

        Ok(spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| TextChunk {
                content: text[span.clone()].to_string(),
                index,
                start_pos: span.start,
                end_pos: span.end,
            })
            .collect())
    }

    /// Split a document into [`Chunk`]s carrying provenance metadata.
    ///
    /// Chunk ids are `"{document_id}-{chunk_index}"`. `extra` metadata is
    /// copied onto every chunk; provenance keys take precedence.
    pub fn chunk(
        &self,
        text: &str,
        source: &str,
        document_id: &str,
        extra: &Metadata,
    ) -> Result<Vec<Chunk>, IngestionError> {
        let pieces = self.split(text, source)?;
        let total = pieces.len();

        Ok(pieces
            .into_iter()
            .map(|piece| {
                let id = format!("{}-{}", document_id, piece.index);
                let mut metadata = extra.clone();
                metadata.insert("source".to_string(), source.to_string());
                metadata.insert("chunk_id".to_string(), id.clone());
                metadata.insert("document_id".to_string(), document_id.to_string());
                metadata.insert("chunk_index".to_string(), piece.index.to_string());
                metadata.insert("total_chunks".to_string(), total.to_string());
                metadata.insert("start_offset".to_string(), piece.start_pos.to_string());

                Chunk {
                    id,
                    document_id: document_id.to_string(),
                    text: piece.content,
                    source: source.to_string(),
                    chunk_index: piece.index,
                    metadata,
                }
            })
            .collect())
    }

    fn recursive_spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        self.split_range(text, 0..text.len(), SEPARATORS, &mut spans);
        spans
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&str],
        out: &mut Vec<Range<usize>>,
    ) {
        let slice = &text[range.clone()];
        if char_len(slice) <= self.chunk_size {
            out.push(range);
            return;
        }

        let Some((position, separator)) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || slice.contains(**sep))
        else {
            out.push(range);
            return;
        };

        // Single oversized token: never cut mid-word
        if separator.is_empty() {
            out.push(range);
            return;
        }

        let finer = &separators[position + 1..];
        let mut fitting = Vec::new();

        for piece in split_keep_separator(slice, separator, range.start) {
            if char_len(&text[piece.clone()]) <= self.chunk_size {
                fitting.push(piece);
            } else {
                self.merge(text, &fitting, out);
                fitting.clear();
                self.split_range(text, piece, finer, out);
            }
        }
        self.merge(text, &fitting, out);
    }

    /// Greedily pack contiguous pieces into chunks, carrying trailing
    /// whole pieces of up to `chunk_overlap` characters into the next chunk.
    fn merge(&self, text: &str, pieces: &[Range<usize>], out: &mut Vec<Range<usize>>) {
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(&text[piece.clone()]);

            if total + len > self.chunk_size && !window.is_empty() {
                push_window(&window, out);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    let Some((_, dropped)) = window.pop_front() else {
                        break;
                    };
                    total -= dropped;
                }
            }

            window.push_back((piece.clone(), len));
            total += len;
        }

        push_window(&window, out);
    }

    fn semantic_spans(&self, text: &str, source: &str) -> Result<Vec<Range<usize>>, IngestionError> {
        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.chunk_overlap)
            .map_err(|e| IngestionError::InvalidConfig(e.to_string()))?;

        let spans = if is_markdown(source) {
            MarkdownSplitter::new(config)
                .chunk_indices(text)
                .map(|(start, chunk)| start..start + chunk.len())
                .collect()
        } else {
            TextSplitter::new(config)
                .chunk_indices(text)
                .map(|(start, chunk)| start..start + chunk.len())
                .collect()
        };
        Ok(spans)
    }
}

/// Convenience wrapper using the default strategy. The source doubles as
/// the document id.
pub fn chunk(
    text: &str,
    source: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, IngestionError> {
    Chunker::with_sizes(chunk_size, chunk_overlap, ChunkingStrategy::Recursive)?
        .chunk(text, source, source, &Metadata::new())
}

fn split_keep_separator(slice: &str, separator: &str, offset: usize) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, sep) in slice.match_indices(separator) {
        let end = idx + sep.len();
        pieces.push(offset + start..offset + end);
        start = end;
    }
    if start < slice.len() {
        pieces.push(offset + start..offset + slice.len());
    }
    pieces
}

fn fold_blank_spans(text: &str, spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    let mut folded: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    let mut leading: Option<usize> = None;

    for span in spans {
        if text[span.clone()].trim().is_empty() {
            match folded.last_mut() {
                Some(previous) => previous.end = previous.end.max(span.end),
                None => {
                    leading.get_or_insert(span.start);
                }
            }
            continue;
        }
        let start = leading.take().map_or(span.start, |s| s.min(span.start));
        folded.push(start..span.end);
    }
    folded
}

fn push_window(window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
        out.push(first.start..last.end);
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn is_markdown(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Python uses indentation to define code blocks. \
        A block starts after a colon and continues while lines stay indented.\n\n\
        FastAPI is a modern web framework for building APIs with Python. \
        It relies on type hints for validation.\nRequests are parsed into models.\n\n\
        Rust enforces ownership at compile time. Borrowed references never outlive their owner.";

    fn recursive(size: usize, overlap: usize) -> Chunker {
        Chunker::with_sizes(size, overlap, ChunkingStrategy::Recursive).unwrap()
    }

    fn reconstruct(chunks: &[TextChunk]) -> String {
        let mut text = String::new();
        let mut covered = 0;
        for chunk in chunks {
            assert!(chunk.start_pos <= covered, "gap before chunk {}", chunk.index);
            assert!(chunk.end_pos > covered, "chunk {} adds nothing", chunk.index);
            text.push_str(&chunk.content[covered - chunk.start_pos..]);
            covered = chunk.end_pos;
        }
        text
    }

    #[test]
    fn test_empty_text() {
        let chunker = recursive(100, 10);
        assert!(chunker.split("", "a.txt").unwrap().is_empty());
        assert!(chunker.split("  \n\n \t", "a.txt").unwrap().is_empty());
        assert!(chunk("", "a.txt", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = recursive(800, 150).split("Hello world.", "a.txt").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello world.");
        assert_eq!(chunks[0].start_pos, 0);
    }

    #[test]
    fn test_reconstructs_original_text() {
        for (size, overlap) in [(40, 10), (60, 0), (80, 30), (25, 5), (800, 150)] {
            let chunks = recursive(size, overlap).split(SAMPLE, "notes.txt").unwrap();
            assert!(!chunks.is_empty());
            assert_eq!(reconstruct(&chunks), SAMPLE, "size={} overlap={}", size, overlap);
        }
    }

    #[test]
    fn test_chunks_respect_size() {
        let chunks = recursive(50, 10).split(SAMPLE, "notes.txt").unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 50, "oversized: {:?}", chunk.content);
        }
    }

    #[test]
    fn test_adjacent_chunks_overlap_within_limit() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi";
        let chunks = recursive(24, 8).split(text, "greek.txt").unwrap();
        assert!(chunks.len() > 2);

        let mut saw_overlap = false;
        for pair in chunks.windows(2) {
            if pair[1].start_pos < pair[0].end_pos {
                let shared = &text[pair[1].start_pos..pair[0].end_pos];
                assert!(shared.chars().count() <= 8);
                saw_overlap = true;
            }
        }
        assert!(saw_overlap);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_zero_overlap_chunks_are_disjoint() {
        let chunks = recursive(30, 0).split(SAMPLE, "notes.txt").unwrap();
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_pos, pair[0].end_pos);
        }
    }

    #[test]
    fn test_blank_runs_never_become_chunks() {
        let text = format!("alpha beta{}gamma delta", "\n\n".repeat(8));
        let chunks = recursive(10, 0).chunk(&text, "gaps.txt", "gaps", &Metadata::new()).unwrap();

        assert_eq!(chunks.len(), 4);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(!chunk.text.trim().is_empty(), "blank chunk {}", i);
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.total_chunks(), Some(chunks.len()));
        }
        assert_eq!(chunks[1].text.trim_end(), "beta");
        assert_eq!(chunks[3].text, "delta");
    }

    #[test]
    fn test_leading_and_trailing_whitespace_folded() {
        let text = format!("\n\n\nalpha beta{}gamma delta\n\n\n\n", "\n\n".repeat(8));
        let chunks = recursive(10, 2).split(&text, "gaps.txt").unwrap();

        assert!(chunks.iter().all(|c| !c.content.trim().is_empty()));
        assert_eq!(chunks[0].start_pos, 0);
        assert_eq!(chunks.last().map(|c| c.end_pos), Some(text.len()));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_sample_paragraph_breaks_not_chunked_alone() {
        for (size, overlap) in [(25, 5), (30, 0), (50, 10), (100, 20)] {
            let chunks = recursive(size, overlap).split(SAMPLE, "notes.txt").unwrap();
            assert!(chunks.iter().all(|c| !c.content.trim().is_empty()));
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i);
            }
        }
    }

    #[test]
    fn test_oversize_token_emitted_whole() {
        let word = "pneumonoultramicroscopicsilicovolcanoconiosis";
        let text = format!("a short intro {} and a short outro", word);
        let chunks = recursive(12, 4).split(&text, "words.txt").unwrap();

        assert!(chunks.iter().any(|c| c.content.trim_end() == word));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_unbroken_text_longer_than_size() {
        let text = "x".repeat(30);
        let chunks = recursive(10, 2).split(&text, "x.txt").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
    }

    #[test]
    fn test_deterministic_chunk_count() {
        let a = recursive(45, 12).split(SAMPLE, "notes.txt").unwrap();
        let b = recursive(45, 12).split(SAMPLE, "notes.txt").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_lengths_are_characters() {
        let text = "café crème brûlée. déjà vu à la carte. naïve façade";
        let chunks = recursive(20, 5).split(text, "fr.txt").unwrap();
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 20);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_chunk_metadata() {
        let mut extra = Metadata::new();
        extra.insert("lang".to_string(), "en".to_string());
        extra.insert("source".to_string(), "ignored".to_string());

        let chunks = recursive(60, 10)
            .chunk(SAMPLE, "guide.txt", "doc-1", &extra)
            .unwrap();
        let total = chunks.len();
        assert!(total > 1);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, format!("doc-1-{}", i));
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.document_id, "doc-1");
            assert_eq!(chunk.metadata["source"], "guide.txt");
            assert_eq!(chunk.metadata["chunk_id"], chunk.id);
            assert_eq!(chunk.metadata["lang"], "en");
            assert_eq!(chunk.total_chunks(), Some(total));
            let start = chunk.start_offset().unwrap();
            assert_eq!(&SAMPLE[start..start + chunk.text.len()], chunk.text);
        }
    }

    #[test]
    fn test_chunk_wrapper_uses_source_as_document_id() {
        let chunks = chunk(SAMPLE, "python-guide.md", 100, 20).unwrap();
        assert_eq!(chunks[0].id, "python-guide.md-0");
        assert_eq!(chunks[0].document_id, "python-guide.md");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            Chunker::with_sizes(0, 0, ChunkingStrategy::Recursive),
            Err(IngestionError::InvalidConfig(_))
        ));
        assert!(matches!(
            Chunker::with_sizes(100, 100, ChunkingStrategy::Recursive),
            Err(IngestionError::InvalidConfig(_))
        ));

        let config = ChunkingConfig { strategy: "fancy".to_string(), ..ChunkingConfig::default() };
        assert!(matches!(Chunker::new(&config), Err(IngestionError::UnknownStrategy(_))));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Semantic".parse::<ChunkingStrategy>().unwrap(), ChunkingStrategy::Semantic);
        assert_eq!(" recursive ".parse::<ChunkingStrategy>().unwrap(), ChunkingStrategy::Recursive);
        assert_eq!(ChunkingStrategy::default().to_string(), "recursive");
    }

    #[test]
    fn test_semantic_strategy_respects_size() {
        let chunker = recursive(60, 10).with_strategy(ChunkingStrategy::Semantic);
        let chunks = chunker.split(SAMPLE, "notes.txt").unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 60);
            assert_eq!(&SAMPLE[chunk.start_pos..chunk.end_pos], chunk.content);
        }
    }

    #[test]
    fn test_semantic_strategy_markdown_source() {
        let text = "# Title\n\nIntro paragraph about the project.\n\n## Usage\n\nRun the binary with a config file.";
        let chunker = recursive(40, 0).with_strategy(ChunkingStrategy::Semantic);
        let chunks = chunker.split(text, "README.md").unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.content.trim().is_empty()));
    }
}
