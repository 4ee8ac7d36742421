use crate::error::{DalError, Result};

/// Location of a string copied into a [`StringArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    chunk: u32,
    offset: u32,
    len: u32,
}

impl Span {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Chunked string pool backing every cell and property value of one
/// response. Chunks are never reallocated once filled, and every span
/// handed out stays valid until the arena is dropped.
#[derive(Debug)]
pub struct StringArena {
    chunks: Vec<String>,
    current_chunk: String,
    chunk_size: usize,
    strings: usize,
}

impl StringArena {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunks: Vec::new(),
            current_chunk: String::new(),
            chunk_size: chunk_size.max(1),
            strings: 0,
        }
    }

    /// Copies `value` into the arena. Values longer than the chunk size
    /// get a chunk of their own.
    pub fn copy(&mut self, value: &str) -> Result<Span> {
        let remaining = self.current_chunk.capacity() - self.current_chunk.len();
        if value.len() > remaining {
            self.allocate_new_chunk(value.len())?;
        }
        if self.chunks.len() > u32::MAX as usize || self.current_chunk.len() > u32::MAX as usize {
            return Err(DalError::MemAllocFail("string arena exceeds 4 GiB".to_string()));
        }

        let span = Span {
            chunk: self.chunks.len() as u32,
            offset: self.current_chunk.len() as u32,
            len: value.len() as u32,
        };
        self.current_chunk.push_str(value);
        self.strings += 1;
        Ok(span)
    }

    fn allocate_new_chunk(&mut self, at_least: usize) -> Result<()> {
        let mut chunk = String::new();
        chunk
            .try_reserve_exact(self.chunk_size.max(at_least))
            .map_err(|e| DalError::MemAllocFail(format!("string arena chunk: {}", e)))?;
        let old_chunk = std::mem::replace(&mut self.current_chunk, chunk);
        if old_chunk.capacity() > 0 {
            self.chunks.push(old_chunk);
        }
        Ok(())
    }

    /// Resolves a span produced by this arena. Spans from another arena
    /// resolve to the empty string.
    pub fn get(&self, span: Span) -> &str {
        let chunk = if span.chunk as usize == self.chunks.len() {
            Some(&self.current_chunk)
        } else {
            self.chunks.get(span.chunk as usize)
        };
        let start = span.offset as usize;
        chunk
            .and_then(|c| c.get(start..start + span.len as usize))
            .unwrap_or("")
    }

    /// Number of strings copied in.
    pub fn len(&self) -> usize {
        self.strings
    }

    pub fn is_empty(&self) -> bool {
        self.strings == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len() + usize::from(self.current_chunk.capacity() > 0)
    }

    pub fn bytes_used(&self) -> usize {
        self.chunks.iter().map(String::len).sum::<usize>() + self.current_chunk.len()
    }
}

impl Default for StringArena {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}
