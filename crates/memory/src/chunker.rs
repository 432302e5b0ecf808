//! Sentence-aware text chunking.
//!
//! Splits at sentence boundaries (`.`, `?`, `!`, newline) while keeping each
//! chunk near a target byte size. Consecutive chunks may share a short
//! overlap so a fact split across a boundary is still retrievable.

/// A chunk of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Trimmed chunk text
    pub text: String,
    /// Start byte offset in the source document
    pub start: usize,
    /// End byte offset in the source document
    pub end: usize,
    /// Position within the document
    pub index: usize,
}

/// Chunker configuration.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            overlap: 32,
        }
    }
}

impl TextChunker {
    /// `overlap` is clamped below `chunk_size`; `chunk_size` is at least 1.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks. Whitespace-only chunks are dropped.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut spans = Vec::new();
        for (start, end) in self.sentence_spans(text) {
            self.split_oversized(text, start, end, &mut spans);
        }

        let mut chunks = Vec::with_capacity(spans.len());
        let mut prev_start = 0;
        for (i, &(start, end)) in spans.iter().enumerate() {
            let start = if i > 0 && self.overlap > 0 {
                self.overlap_start(text, start, prev_start)
            } else {
                start
            };
            prev_start = spans[i].0;

            let body = text[start..end].trim();
            if body.is_empty() {
                continue;
            }
            chunks.push(TextChunk {
                text: body.to_string(),
                start,
                end,
                index: chunks.len(),
            });
        }
        chunks
    }

    /// Group sentences into spans of roughly `chunk_size` bytes.
    fn sentence_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut chunk_start = 0;
        let mut last_boundary = 0;

        for (i, byte) in text.bytes().enumerate() {
            if !matches!(byte, b'.' | b'?' | b'!' | b'\n') {
                continue;
            }
            let potential_end = i + 1;
            if potential_end - chunk_start >= self.chunk_size && last_boundary > chunk_start {
                spans.push((chunk_start, last_boundary));
                chunk_start = last_boundary;
            }
            last_boundary = potential_end;
        }

        if chunk_start < text.len() {
            spans.push((chunk_start, text.len()));
        }
        spans
    }

    /// Break a span with no usable sentence boundary, preferring whitespace.
    fn split_oversized(&self, text: &str, mut start: usize, end: usize, out: &mut Vec<(usize, usize)>) {
        while end - start > self.chunk_size {
            let mut cut = floor_char_boundary(text, start + self.chunk_size);
            let window = &text[start..cut];
            if let Some((ws, ch)) = window.char_indices().rev().find(|(_, c)| c.is_whitespace())
                && ws >= self.chunk_size / 2
            {
                cut = start + ws + ch.len_utf8();
            }
            if cut <= start {
                // a single char wider than chunk_size
                cut = ceil_char_boundary(text, start + 1);
            }
            out.push((start, cut));
            start = cut;
        }
        if start < end {
            out.push((start, end));
        }
    }

    /// Pull a chunk's start back by up to `overlap` bytes, snapped to a word start.
    fn overlap_start(&self, text: &str, start: usize, floor: usize) -> usize {
        let candidate = ceil_char_boundary(text, start.saturating_sub(self.overlap).max(floor));
        if candidate >= start {
            return start;
        }
        let bytes = text.as_bytes();
        let limit = start.min(candidate + 50);
        (candidate..limit)
            .find(|&i| bytes[i] == b' ' || bytes[i] == b'\n')
            .map(|i| i + 1)
            .filter(|&s| s < start)
            .unwrap_or(candidate)
    }
}

fn floor_char_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn ceil_char_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_text() {
        let chunker = TextChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\t ").is_empty());
    }

    #[test]
    fn small_text_is_one_chunk() {
        let chunks = TextChunker::default().chunk("The sky is blue.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The sky is blue.");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn long_text_splits_on_sentences() {
        let chunker = TextChunker::new(50, 0);
        let text = "This is sentence one. This is sentence two. This is sentence three. This is sentence four.";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.text.ends_with('.'), "chunk {:?} cut mid-sentence", chunk.text);
        }
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn overlap_repeats_previous_words() {
        let chunker = TextChunker::new(40, 15);
        let text = "Torque the flange bolts first. Then check the gasket seating. Finally log the reading.";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 2);
        // second chunk starts before the first one ends
        assert!(chunks[1].start < chunks[0].end);
    }

    #[test]
    fn oversized_run_is_hard_split() {
        let chunker = TextChunker::new(20, 0);
        let text = "word ".repeat(30);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.end - c.start <= 20));
    }

    #[test]
    fn multibyte_text_never_panics() {
        let chunker = TextChunker::new(8, 3);
        let text = "Überprüfung läuft. Ventil öffnen. Druck prüfen. ✓✓✓✓✓✓✓✓";
        let chunks = chunker.chunk(text);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn multibyte_whitespace_cut_stays_on_char_boundary() {
        let nbsp = format!("{}\u{a0}{}", "a".repeat(12), "b".repeat(20));
        let chunks = TextChunker::new(20, 0).chunk(&nbsp);
        assert_eq!(chunks[0].text, "a".repeat(12));
        assert_eq!(chunks.iter().map(|c| c.text.len()).sum::<usize>(), 32);

        let ideographic = format!("{}\u{3000}{}", "a".repeat(12), "b".repeat(20));
        let chunks = TextChunker::new(20, 4).chunk(&ideographic);
        assert_eq!(chunks[0].text, "a".repeat(12));
        assert!(chunks.iter().all(|c| ideographic.is_char_boundary(c.start)));

        let pasted = format!("{}\u{a0}{}", "word ".repeat(150), "x".repeat(600));
        let chunks = TextChunker::default().chunk(&pasted);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().any(|c| c.text.contains('x')));
    }

    #[test]
    fn overlap_is_clamped() {
        let chunker = TextChunker::new(10, 50);
        assert_eq!(chunker.overlap(), 9);
    }
}
