use std::ops::Range;

/// Split a playback payload into device-sized writes
///
/// Chunks are `chunk_size` bytes. A trailing remainder shorter than
/// `min_tail` is folded into the previous chunk so the device never gets a
/// sliver of audio on its own; no write exceeds `chunk_size + min_tail - 1`.
pub fn plan_chunks(len: usize, chunk_size: usize, min_tail: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(len / chunk_size + 1);

    let mut start = 0;
    while start < len {
        let end = (start + chunk_size).min(len);
        chunks.push(start..end);
        start = end;
    }

    if chunks.len() > 1 {
        let tail = chunks[chunks.len() - 1].len();
        if tail < min_tail {
            let last = chunks.pop().map(|r| r.end).unwrap_or(len);
            if let Some(prev) = chunks.last_mut() {
                prev.end = last;
            }
        }
    }

    chunks
}
