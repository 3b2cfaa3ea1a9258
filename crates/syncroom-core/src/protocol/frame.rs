//! Newline batching.
//!
//! A writer may coalesce several envelopes into one text frame separated by
//! `\n`. Receivers split and parse each segment on its own.

/// Separator between batched envelopes.
pub const BATCH_SEPARATOR: char = '\n';

/// Iterate the non-blank segments of a (possibly batched) text frame.
pub fn split_batch(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(BATCH_SEPARATOR)
        .map(|seg| seg.strip_suffix('\r').unwrap_or(seg))
        .filter(|seg| !seg.trim().is_empty())
}

/// Join already-encoded segments into one frame.
pub fn join_batch<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, seg) in segments.into_iter().enumerate() {
        if i > 0 {
            out.push(BATCH_SEPARATOR);
        }
        out.push_str(seg.as_ref());
    }
    out
}
