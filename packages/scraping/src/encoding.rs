//! Response body decoding with legacy code-page recovery.
//!
//! The standard library and reqwest both assume well-declared charsets;
//! real article pages frequently lie. The ladder here decodes with the
//! declared charset first, measures how much of the result is readable,
//! and only then falls back to detection and a fixed list of encodings,
//! keeping whichever decode reads best.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, warn};

/// Accept the declared-charset decode outright above this ratio.
const GOOD_RATIO: f64 = 0.85;

/// Below this ratio no decoding produced text; treat the body as binary.
const BINARY_RATIO: f64 = 0.30;

/// Below this ratio, strip NULs and replacement characters from the
/// winning decode.
const CLEAN_RATIO: f64 = 0.60;

/// Fallback encodings tried in order when the declared charset reads badly.
const ENCODING_LADDER: [&str; 5] = ["utf-8", "iso-8859-1", "windows-1252", "latin-1", "cp1252"];

/// Fraction of the first 1000 chars that are printable or whitespace.
///
/// Returns 1.0 for empty input so short bodies are not penalised.
pub fn printable_ratio(text: &str) -> f64 {
    let sample: Vec<char> = text.chars().take(1000).collect();
    if sample.is_empty() {
        return 1.0;
    }

    let printable = sample
        .iter()
        .filter(|c| c.is_whitespace() || (!c.is_control() && **c != '\u{FFFD}'))
        .count();

    printable as f64 / sample.len() as f64
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn strip_unreadable(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\0' && *c != '\u{FFFD}')
        .collect()
}

/// Decode a response body, recovering from bad charset declarations.
///
/// `declared` is the charset from the Content-Type header, if any.
/// Returns `None` when no decoding yields readable text (binary data
/// served with a text content type).
pub fn decode_body(bytes: &[u8], declared: Option<&str>) -> Option<String> {
    if bytes.is_empty() {
        return Some(String::new());
    }

    let declared_encoding = declared
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let mut best_text = decode_with(bytes, declared_encoding);
    let mut best_ratio = printable_ratio(&best_text);

    if best_ratio >= GOOD_RATIO {
        return Some(best_text);
    }

    debug!(
        declared = declared_encoding.name(),
        ratio = best_ratio,
        "declared charset reads poorly, trying recovery"
    );

    // Library-level detection first.
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let detected = detector.guess(None, true);
    let detected_text = decode_with(bytes, detected);
    let detected_ratio = printable_ratio(&detected_text);
    if detected_ratio > best_ratio {
        best_text = detected_text;
        best_ratio = detected_ratio;
    }

    // Then the fixed ladder.
    for label in ENCODING_LADDER {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            continue;
        };
        let candidate = decode_with(bytes, encoding);
        let ratio = printable_ratio(&candidate);
        if ratio > best_ratio {
            best_text = candidate;
            best_ratio = ratio;
        }
        if best_ratio > 0.95 {
            break;
        }
    }

    if best_ratio < BINARY_RATIO {
        warn!(
            best_ratio = best_ratio,
            "no encoding produced readable text, treating as binary"
        );
        return None;
    }

    if best_ratio < CLEAN_RATIO {
        best_text = strip_unreadable(&best_text);
    }

    Some(best_text)
}
