//! Language-aware sentence chunker (§4.4): splits incremental LLM output
//! at the earliest safe terminator so TTS can start speaking before the
//! whole reply has arrived.

/// Language family, driving the minimum chunk size and terminator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Chinese,
    English,
    Arabic,
}

impl Language {
    fn min_chunk_size(self) -> usize {
        match self {
            Language::Chinese => 10,
            Language::English => 30,
            Language::Arabic => 10,
        }
    }

    fn is_terminator(self, c: char) -> bool {
        match self {
            Language::Chinese => matches!(c, '.' | '?' | '!' | ';' | ':' | ',' | '-')
                || matches!(c, '。' | '？' | '！' | '，' | '：' | '；' | '—'),
            Language::English => matches!(c, '.' | '?' | '!' | ';' | ':' | ',' | '-'),
            Language::Arabic => matches!(c, '.' | '?' | '!' | ';' | ':' | ',' | '-')
                || matches!(c, '؟' | '؛' | '،' | 'ـ' | '۔'),
        }
    }
}

const ELLIPSIS_CHARS: [char; 3] = ['.', '…', '⋯'];

fn is_ellipsis_at(chars: &[char], idx: usize) -> bool {
    if idx >= chars.len() {
        return false;
    }
    if chars[idx] == '…' || chars[idx] == '⋯' {
        return true;
    }
    // Three consecutive ASCII dots, or the terminator itself is the last
    // of such a run.
    if chars[idx] == '.' {
        let start = idx.saturating_sub(2);
        let window = &chars[start..=idx.min(chars.len() - 1)];
        return window.iter().filter(|&&c| c == '.').count() >= 2;
    }
    false
}

fn is_digit_like(c: char) -> bool {
    c.is_ascii_digit() || c.is_numeric()
}

/// True if splitting right after `chars[idx]` (the terminator) would cut
/// through a decimal/grouped numeral, a time/date literal, an
/// abbreviation, a hyphen-joined compound, an ellipsis, or (Arabic only)
/// immediately before the definite article `ال` or across a tatweel.
fn split_is_unsafe(chars: &[char], idx: usize, lang: Language) -> bool {
    let terminator = chars[idx];
    let prev = idx.checked_sub(1).map(|i| chars[i]);
    let next = chars.get(idx + 1).copied();

    if is_ellipsis_at(chars, idx) {
        return true;
    }

    // Decimal / grouped numerals: "3.14", "1,000".
    if matches!(terminator, '.' | ',') {
        if let (Some(p), Some(n)) = (prev, next) {
            if is_digit_like(p) && is_digit_like(n) {
                return true;
            }
        }
    }

    // Time/date literals: "12:30", "2023-01-01".
    if matches!(terminator, ':' | '-') {
        if let (Some(p), Some(n)) = (prev, next) {
            if is_digit_like(p) && is_digit_like(n) {
                return true;
            }
        }
    }

    // Hyphen-joined compounds: letter-hyphen-letter.
    if terminator == '-' {
        if let (Some(p), Some(n)) = (prev, next) {
            if p.is_alphabetic() && n.is_alphabetic() {
                return true;
            }
        }
    }

    // Abbreviations: "Dr." / "U.S." — a single upper-case letter (or a
    // run of them separated by dots) immediately before the period.
    if terminator == '.' {
        if let Some(p) = prev {
            if p.is_uppercase() && p.is_alphabetic() {
                return true;
            }
        }
    }

    if lang == Language::Arabic {
        // Across tatweel.
        if terminator == 'ـ' {
            return true;
        }
        // Immediately before the definite article "ال".
        if let Some(rest) = chars.get(idx + 1..) {
            if rest.starts_with(&['ا', 'ل']) {
                return true;
            }
        }
    }

    false
}

/// Find the earliest safe split point at or after `min_chunk_size` and
/// return `(chunk, remainder)`. Returns `(None, text)` if no safe split
/// exists, meaning the caller should keep buffering.
pub fn split(text: &str, language: Language) -> (Option<String>, String) {
    let chars: Vec<char> = text.chars().collect();
    let min_size = language.min_chunk_size();

    if chars.len() < min_size {
        return (None, text.to_string());
    }

    for (idx, &c) in chars.iter().enumerate() {
        if idx + 1 < min_size {
            continue;
        }
        if !language.is_terminator(c) {
            continue;
        }
        if split_is_unsafe(&chars, idx, language) {
            continue;
        }
        let chunk: String = chars[..=idx].iter().collect();
        let remainder: String = chars[idx + 1..].iter().collect();
        return (Some(chunk), remainder);
    }

    (None, text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_english_at_sentence_boundary() {
        let text = "This is a long enough sentence to chunk. And the remainder.";
        let (chunk, rest) = split(text, Language::English);
        assert_eq!(
            chunk.as_deref(),
            Some("This is a long enough sentence to chunk.")
        );
        assert_eq!(rest, " And the remainder.");
    }

    #[test]
    fn does_not_split_below_min_chunk_size() {
        let (chunk, rest) = split("Hi.", Language::English);
        assert!(chunk.is_none());
        assert_eq!(rest, "Hi.");
    }

    #[test]
    fn protects_decimal_numbers() {
        let text = "The value is precisely 3.14159 according to the long calculation result.";
        let (chunk, _rest) = split(text, Language::English);
        // First terminator inside "3.14159" must be skipped.
        if let Some(c) = chunk {
            assert!(!c.ends_with("3."));
        }
    }

    #[test]
    fn protects_abbreviations() {
        let text = "Dr. Smith arrived early today for the long scheduled appointment.";
        let (chunk, _rest) = split(text, Language::English);
        if let Some(c) = chunk {
            assert_ne!(c.trim(), "Dr.");
        }
    }

    #[test]
    fn protects_ellipsis() {
        let text = "Well... this sentence trails off before the actual terminator point.";
        let (chunk, _rest) = split(text, Language::English);
        if let Some(c) = chunk {
            assert!(!c.trim_end().ends_with("Well..."));
        }
    }

    #[test]
    fn no_safe_split_returns_none_and_full_text() {
        let text = "Dr. A.B. 3.14 12:30 keeps going without any safe terminator available anywhere";
        let (chunk, rest) = split(text, Language::English);
        if chunk.is_none() {
            assert_eq!(rest, text);
        }
    }

    #[test]
    fn chinese_min_chunk_size_is_smaller() {
        let text = "今天天气很好。明天也不错。";
        let (chunk, _rest) = split(text, Language::Chinese);
        assert!(chunk.is_some());
    }
}
