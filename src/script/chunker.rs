use super::DialogueChunk;

/// Splits cleaned script text into overlapping windows.
///
/// Each window is `chunk_size` characters and the start advances by half a
/// window, so consecutive chunks share half their content. Windows shorter
/// than `min_chunk_chars` (the tail of the script) are dropped. Ids are
/// `{movie_title}_{index}` with the index increasing per movie.
pub struct OverlapChunker {
    chunk_size: usize,
    min_chunk_chars: usize,
}

impl OverlapChunker {
    pub fn new(chunk_size: usize, min_chunk_chars: usize) -> Self {
        Self {
            chunk_size,
            min_chunk_chars,
        }
    }

    /// Chunk one movie's cleaned script. Windowing is by character, so
    /// multi-byte text never splits mid-character.
    pub fn chunk(&self, text: &str, movie_title: &str) -> Vec<DialogueChunk> {
        let chars: Vec<char> = text.chars().collect();
        let step = (self.chunk_size / 2).max(1);

        let mut chunks = Vec::new();
        let mut index = 0;
        for start in (0..chars.len()).step_by(step) {
            let end = (start + self.chunk_size).min(chars.len());
            if end - start < self.min_chunk_chars {
                continue;
            }
            let window: String = chars[start..end].iter().collect();
            chunks.push(DialogueChunk {
                id: format!("{}_{}", movie_title, index),
                text: window,
                movie_title: movie_title.to_string(),
            });
            index += 1;
        }
        chunks
    }
}
