use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Lower-cases, strips diacritics and trims, so "Módulo" and "modulo" compare equal
pub fn fold(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_diacritics() {
        assert_eq!(fold("  Ficção Científica "), "ficcao cientifica");
        assert_eq!(fold("MÓDULO 2"), "modulo 2");
        assert_eq!(fold("Episódio"), "episodio");
    }

    #[test]
    fn test_fold_handles_decomposed_input() {
        // "e" followed by U+0301 COMBINING ACUTE ACCENT
        assert_eq!(fold("Se\u{301}ries"), "series");
    }
}
