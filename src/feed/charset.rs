//! Fixed registry of character decoders for feeds that declare a non-UTF-8 charset.

/// Windows-1252 code points for bytes 0x80..=0x9F. Unassigned bytes map to the
/// matching C1 control, as browsers do.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// A decoder selected by the charset name given in a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// Lossy UTF-8; the fallback for empty or unrecognised labels
    #[default]
    Utf8,
    Latin1,
    Ascii,
    Windows1252,
}

impl Charset {
    /// Look up a decoder by label. Labels are case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Some(Charset::Latin1),
            "us-ascii" | "ascii" => Some(Charset::Ascii),
            "windows-1252" | "cp1252" => Some(Charset::Windows1252),
            _ => None,
        }
    }

    /// Pick the decoder for a feed, falling back to the default when the label
    /// is empty or not in the registry.
    pub fn for_feed(label: &str) -> Self {
        if label.trim().is_empty() {
            return Charset::default();
        }
        Self::from_label(label).unwrap_or_else(|| {
            tracing::debug!(charset = %label, "Unknown charset, using default decoder");
            Charset::default()
        })
    }

    /// Decode raw feed bytes into UTF-8 text ready for the parser.
    ///
    /// For single-byte charsets the XML declaration is rewritten to say UTF-8 so
    /// the parser does not decode the text a second time.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => relabel_declaration(bytes.iter().map(|&b| char::from(b)).collect()),
            Charset::Ascii => relabel_declaration(
                bytes
                    .iter()
                    .map(|&b| if b.is_ascii() { char::from(b) } else { '\u{FFFD}' })
                    .collect(),
            ),
            Charset::Windows1252 => relabel_declaration(
                bytes
                    .iter()
                    .map(|&b| match b {
                        0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
                        _ => char::from(b),
                    })
                    .collect(),
            ),
        }
    }
}

/// Replace the `encoding` pseudo-attribute of a leading `<?xml ...?>` declaration.
fn relabel_declaration(text: String) -> String {
    let body = text.trim_start_matches('\u{FEFF}');
    if !body.starts_with("<?xml") {
        return text;
    }
    let Some(end) = body.find("?>") else {
        return text;
    };
    let declaration = &body[..end];
    let Some(attr) = declaration.find("encoding") else {
        return text;
    };

    let after = &declaration[attr + "encoding".len()..];
    let Some(quote_pos) = after.find(|c: char| c == '"' || c == '\'') else {
        return text;
    };
    let quote = after[quote_pos..].chars().next().unwrap_or('"');
    let value_start = attr + "encoding".len() + quote_pos + 1;
    let Some(value_len) = declaration[value_start..].find(quote) else {
        return text;
    };

    let mut out = String::with_capacity(body.len());
    out.push_str(&body[..value_start]);
    out.push_str("UTF-8");
    out.push_str(&body[value_start + value_len..]);
    out
}
