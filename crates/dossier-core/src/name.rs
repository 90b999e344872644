//! Canonical name normalization.
//!
//! All identity decisions go through [`normalize`], so two mentions of the
//! same person that differ only in spacing or letter case collapse to one
//! canonical form.

/// Capitalizes one token: first character uppercased, the rest lowercased.
///
/// Works per-character so Cyrillic names are handled the same as Latin.
fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.extend(chars.flat_map(|c| c.to_lowercase()));
            out
        }
        None => String::new(),
    }
}

/// Normalizes a free-text name into canonical "Фамилия Имя Отчество" form.
///
/// Splits on whitespace and capitalizes each token. Names with three or
/// more tokens keep the first three (surname, given name, patronymic);
/// two tokens are joined with a single space; a single token is returned
/// capitalized. Pure and total: never fails, idempotent.
pub fn normalize(raw: &str) -> String {
    let parts: Vec<String> = raw.split_whitespace().map(capitalize).collect();
    match parts.len() {
        0 => String::new(),
        1 => parts.into_iter().next().unwrap_or_default(),
        2 => parts.join(" "),
        _ => parts[..3].join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_token_cyrillic() {
        assert_eq!(normalize("иванов иван иванович"), "Иванов Иван Иванович");
    }

    #[test]
    fn test_extra_tokens_dropped() {
        assert_eq!(
            normalize("Иванов Иван Иванович 05.08.1990 лишнее"),
            "Иванов Иван Иванович"
        );
    }

    #[test]
    fn test_two_tokens() {
        assert_eq!(normalize("ПЕТРОВ иван"), "Петров Иван");
    }

    #[test]
    fn test_single_token() {
        assert_eq!(normalize("  сидоров "), "Сидоров");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["иванов иван иванович", "Петров Иван", "x", ""] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_whitespace_and_case_collapse() {
        assert_eq!(
            normalize("  иванов   ИВАН\tиванович "),
            normalize("Иванов Иван Иванович")
        );
    }
}
