//! Escape-sequence normalization for screen matching.
//!
//! The game draws its screens with cursor positioning and color codes. The
//! trigger engine matches against plain text, so settled output is passed
//! through [`normalize`] first. Only two forms are removed:
//!
//! - CSI sequences: `ESC [`, parameter/intermediate bytes (`0x20..=0x3F`),
//!   then a final byte in `0x40..=0x7E`
//! - the charset reset `ESC ( B`
//!
//! Anything else, including a CSI sequence cut off before its final byte,
//! is kept verbatim.

const ESC: char = '\u{1b}';

/// Strip CSI sequences and `ESC ( B` from `raw`, then trim surrounding whitespace.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find(ESC) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match recognized_len(tail.as_bytes()) {
            Some(len) => rest = &tail[len..],
            None => {
                out.push(ESC);
                rest = &tail[ESC.len_utf8()..];
            }
        }
    }
    out.push_str(rest);

    out.trim().to_string()
}

/// Length in bytes of the recognized escape sequence at the start of `bytes`,
/// or `None` when `bytes` does not begin with one.
fn recognized_len(bytes: &[u8]) -> Option<usize> {
    match bytes {
        [0x1b, b'(', b'B', ..] => Some(3),
        [0x1b, b'[', params @ ..] => {
            let body = params
                .iter()
                .take_while(|b| (0x20..=0x3F).contains(*b))
                .count();
            match params.get(body) {
                Some(0x40..=0x7E) => Some(2 + body + 1),
                _ => None,
            }
        }
        _ => None,
    }
}
