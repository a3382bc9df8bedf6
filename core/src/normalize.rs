//! Text-answer normalization.
//!
//! Free-text answers compare case-insensitively with accents folded to
//! their ASCII base.  Folding is NFKD decomposition with combining
//! marks stripped, plus a short table for Latin ligatures NFKD leaves
//! alone.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold a string to its comparison form.
pub fn fold(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.trim().nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            'æ' | 'Æ' => out.push_str("ae"),
            'œ' | 'Œ' => out.push_str("oe"),
            'ß' => out.push_str("ss"),
            'ø' | 'Ø' => out.push('o'),
            'đ' | 'Đ' => out.push('d'),
            'ł' | 'Ł' => out.push('l'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Whether a submitted text answer matches any accepted answer.
pub fn answer_matches(submitted: &str, accepted: &[String]) -> bool {
    let folded = fold(submitted);
    accepted.iter().any(|a| fold(a) == folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_case_and_accents() {
        assert_eq!(fold("Paris"), "paris");
        assert_eq!(fold("Genève"), "geneve");
        assert_eq!(fold("ÉLÉPHANT"), "elephant");
        assert_eq!(fold("  çédille "), "cedille");
        assert_eq!(fold("Señor"), "senor");
    }

    #[test]
    fn test_fold_ligatures() {
        assert_eq!(fold("Œuvre"), "oeuvre");
        assert_eq!(fold("Cæsar"), "caesar");
        assert_eq!(fold("Straße"), "strasse");
        assert_eq!(fold("Øresund"), "oresund");
    }

    #[test]
    fn test_answer_matches() {
        let accepted = vec!["Genève".to_string(), "Geneva".to_string()];
        assert!(answer_matches("geneve", &accepted));
        assert!(answer_matches("GENEVA", &accepted));
        assert!(answer_matches(" Genève ", &accepted));
        assert!(!answer_matches("Lausanne", &accepted));
    }
}
