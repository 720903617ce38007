//! Line-oriented tokenizer for .rr assembly
//!
//! One instruction per line, tokens separated by whitespace, `#` starts a
//! comment that runs to the end of the line. Tokenization cannot fail; all
//! real diagnostics belong to the parser, which still knows each token's
//! source line.

/// The tokens of one source line that carried any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based source line number, for error reporting.
    pub number: usize,
    pub tokens: Vec<String>,
}

/// Split a source into token lines.
///
/// Lines that are empty, whitespace-only or whole-line comments produce no
/// entry. A `#` anywhere cuts the rest of the line, including the remainder
/// of the token it appears in.
pub fn tokenize(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let mut tokens = Vec::new();
        'toks: for tok in raw.split_whitespace() {
            match tok.find('#') {
                Some(0) => break 'toks,
                Some(pos) => {
                    tokens.push(tok[..pos].to_string());
                    break 'toks;
                }
                None => tokens.push(tok.to_string()),
            }
        }
        if !tokens.is_empty() {
            lines.push(Line {
                number: i + 1,
                tokens,
            });
        }
    }
    lines
}
