//! Outbound text limits.

/// Maximum message length accepted by the Bot API, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Length of `text` as the Bot API counts it.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Split `text` into chunks of at most `limit` UTF-16 code units.
///
/// Chunks break on line boundaries where possible, and joining line-split chunks with `\n`
/// gives back `text`, empty lines included. A single line longer than `limit` is cut at
/// character boundaries. Always returns at least one chunk.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if utf16_len(text) <= limit {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    // Whether `current` holds at least one line, possibly an empty one.
    let mut started = false;

    for line in text.split('\n') {
        let line_len = utf16_len(line);
        let sep = usize::from(started);

        if current_len + sep + line_len <= limit {
            if started {
                current.push('\n');
            }
            current.push_str(line);
            current_len += sep + line_len;
            started = true;
            continue;
        }

        if started {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        started = true;

        for c in line.chars() {
            let c_len = c.len_utf16();
            if current_len + c_len > limit && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(c);
            current_len += c_len;
        }
    }

    chunks.push(current);
    chunks
}
