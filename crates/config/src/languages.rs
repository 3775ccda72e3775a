//! Supported-language tables
//!
//! Enumerated routing data: which languages each model family serves, the
//! mapping from human language names to ISO 639-1 codes, and a small
//! common-phrase table used for cheap detection before any model call.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Languages the high-quality family serves natively (curated set).
pub const HIGH_QUALITY_CODES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "nl", "pl", "ro", "cs", "el", "tr", "ru", "uk", "ar",
    "he", "hi", "id", "vi", "ja", "ko", "zh",
];

/// Languages the high-coverage family serves natively.
pub const HIGH_COVERAGE_NATIVE_CODES: &[&str] = &["en", "es", "fr", "de", "pt", "ja"];

/// Additional codes the high-coverage family serves speculatively.
pub const HIGH_COVERAGE_SPECULATIVE_CODES: &[&str] = &[
    "af", "am", "bn", "bg", "ca", "da", "et", "fa", "fi", "gu", "hr", "hu", "hy", "is", "ka",
    "kk", "km", "kn", "lo", "lt", "lv", "mk", "ml", "mr", "ms", "my", "ne", "no", "pa", "si",
    "sk", "sl", "sq", "sr", "sv", "sw", "ta", "te", "th", "tl", "ur", "uz", "zu",
];

/// Human language names (lowercased) to ISO 639-1 codes.
static NAME_TO_CODE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("english", "en"),
        ("spanish", "es"),
        ("french", "fr"),
        ("german", "de"),
        ("italian", "it"),
        ("portuguese", "pt"),
        ("dutch", "nl"),
        ("polish", "pl"),
        ("romanian", "ro"),
        ("czech", "cs"),
        ("greek", "el"),
        ("turkish", "tr"),
        ("russian", "ru"),
        ("ukrainian", "uk"),
        ("arabic", "ar"),
        ("hebrew", "he"),
        ("hindi", "hi"),
        ("indonesian", "id"),
        ("vietnamese", "vi"),
        ("japanese", "ja"),
        ("korean", "ko"),
        ("chinese", "zh"),
        ("mandarin", "zh"),
        ("bengali", "bn"),
        ("tamil", "ta"),
        ("telugu", "te"),
        ("urdu", "ur"),
        ("swahili", "sw"),
        ("thai", "th"),
        ("tagalog", "tl"),
        ("filipino", "tl"),
        ("persian", "fa"),
        ("farsi", "fa"),
        ("swedish", "sv"),
        ("danish", "da"),
        ("norwegian", "no"),
        ("finnish", "fi"),
        ("hungarian", "hu"),
        ("malay", "ms"),
        ("punjabi", "pa"),
    ])
});

/// Short common phrases keyed by language code, for cheap detection.
///
/// Matching is lowercase substring containment; two or more matches give
/// high confidence. English is intentionally last so that loanwords in
/// other languages win first.
static COMMON_PHRASES: Lazy<Vec<(&'static str, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        (
            "es",
            &[
                "hola",
                "gracias",
                "por favor",
                "¿cómo",
                "cómo puedo",
                "qué es",
                "cambio climático",
                "huella de carbono",
            ] as &[&str],
        ),
        (
            "fr",
            &[
                "bonjour",
                "merci",
                "s'il vous plaît",
                "comment puis-je",
                "qu'est-ce que",
                "changement climatique",
                "empreinte carbone",
            ],
        ),
        (
            "de",
            &[
                "hallo",
                "danke",
                "bitte",
                "wie kann ich",
                "was ist",
                "klimawandel",
                "treibhausgas",
            ],
        ),
        (
            "pt",
            &[
                "olá",
                "obrigado",
                "obrigada",
                "como posso",
                "o que é",
                "mudança climática",
                "pegada de carbono",
            ],
        ),
        (
            "it",
            &[
                "ciao",
                "grazie",
                "per favore",
                "come posso",
                "che cos'è",
                "cambiamento climatico",
            ],
        ),
        ("hi", &["नमस्ते", "धन्यवाद", "जलवायु", "कैसे"]),
        ("zh", &["你好", "谢谢", "气候", "怎么"]),
        ("ja", &["こんにちは", "ありがとう", "気候", "どうやって"]),
        ("ko", &["안녕", "감사", "기후"]),
        ("ar", &["مرحبا", "شكرا", "مناخ", "كيف"]),
        ("ru", &["привет", "спасибо", "климат", "как"]),
        (
            "en",
            &[
                "hello",
                "thank you",
                "what is",
                "what are",
                "how can i",
                "how do i",
                "climate change",
                "carbon footprint",
                "global warming",
            ],
        ),
    ]
});

/// Resolve a caller-declared language name or code to an ISO 639-1 code.
pub fn code_for_name(name: &str) -> Option<&'static str> {
    let normalized = name.trim().to_lowercase();
    if let Some(code) = NAME_TO_CODE.get(normalized.as_str()) {
        return Some(code);
    }
    // Accept a bare code if any table knows it.
    all_known_codes().into_iter().find(|c| *c == normalized)
}

fn all_known_codes() -> Vec<&'static str> {
    HIGH_QUALITY_CODES
        .iter()
        .chain(HIGH_COVERAGE_NATIVE_CODES)
        .chain(HIGH_COVERAGE_SPECULATIVE_CODES)
        .copied()
        .collect()
}

pub fn is_high_quality(code: &str) -> bool {
    HIGH_QUALITY_CODES.contains(&code)
}

pub fn is_high_coverage(code: &str) -> bool {
    HIGH_COVERAGE_NATIVE_CODES.contains(&code) || HIGH_COVERAGE_SPECULATIVE_CODES.contains(&code)
}

pub fn is_supported(code: &str) -> bool {
    is_high_quality(code) || is_high_coverage(code)
}

/// Cheap phrase-table detection. Returns `(code, confidence)` for the
/// language with the most phrase matches, or `None` when nothing matches.
pub fn detect_by_phrase(text: &str) -> Option<(&'static str, f32)> {
    let lowered = text.to_lowercase();
    let mut best: Option<(&'static str, usize)> = None;
    for (code, phrases) in COMMON_PHRASES.iter() {
        let matches = phrases.iter().filter(|p| lowered.contains(*p)).count();
        if matches > 0 && best.map(|(_, n)| matches > n).unwrap_or(true) {
            best = Some((code, matches));
        }
    }
    best.map(|(code, matches)| {
        let confidence = if matches >= 2 { 0.9 } else { 0.7 };
        (code, confidence)
    })
}

/// Whether the text is predominantly Latin-script.
///
/// Used by the undetected-language rule: a short non-Latin query with no
/// detection signal gets the "please select your language" guidance instead
/// of a guess.
pub fn is_latin_script(text: &str) -> bool {
    let alphabetic: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alphabetic.is_empty() {
        return false;
    }
    let latin = alphabetic
        .iter()
        .filter(|c| c.is_ascii_alphabetic() || matches!(**c, '\u{00C0}'..='\u{024F}'))
        .count();
    latin * 2 >= alphabetic.len()
}
