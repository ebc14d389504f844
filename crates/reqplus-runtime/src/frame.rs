//! Backtrace frame parsing
//!
//! Frames look like `path:LINE` or `path:LINE:in method`. Paths may contain
//! colons themselves (`C:/lib/x.rb:3`), so every colon followed by digits is
//! a candidate and the last valid one wins.

/// Split a frame into its path and line number.
///
/// A bare `path:LINE` needs a line above zero; `path:LINE:in ...` accepts
/// any line. The path must be non-empty.
pub fn split_frame(frame: &str) -> Option<(&str, u32)> {
    const IN_MARKER: &[u8] = b":in ";

    let bytes = frame.as_bytes();
    let mut found = None;
    let mut cursor = 0;

    while let Some(offset) = bytes[cursor..].iter().position(|&b| b == b':') {
        let colon = cursor + offset;
        let digits_start = colon + 1;
        let digits_end = digits_start
            + bytes[digits_start..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
        cursor = digits_start;

        if digits_end == digits_start {
            continue;
        }
        let rest = &bytes[digits_end..];
        let at_end = rest.is_empty();
        if !at_end && !rest.starts_with(IN_MARKER) {
            continue;
        }
        let Ok(line) = frame[digits_start..digits_end].parse::<u32>() else {
            continue;
        };
        if at_end && line == 0 {
            continue;
        }
        if colon > 0 {
            found = Some((&frame[..colon], line));
        }
        if at_end {
            break;
        }
        cursor = digits_end + IN_MARKER.len();
    }

    found
}
