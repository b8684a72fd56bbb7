//! Label normalization.
//!
//! Page labels come in the page locale ("Max drawdown:", "Рост", "Время
//! открытия"). They are transliterated to Latin and folded to camelCase so the
//! record has stable keys across locales: `maxDrawdown`, `rost`,
//! `vremyaOtkrytiya`.

/// Latin spelling of a Cyrillic letter, `None` for anything else.
fn cyrillic_to_latin(c: char) -> Option<&'static str> {
    let lower = c.to_lowercase().next().unwrap_or(c);
    let latin = match lower {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' | 'і' => "i",
        'й' | 'ы' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' | 'ь' => "",
        'ю' => "yu",
        'я' => "ya",
        'є' => "ye",
        'ї' => "yi",
        _ => return None,
    };
    Some(latin)
}

/// Replace Cyrillic letters with their Latin spelling; other characters pass through.
#[must_use]
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match cyrillic_to_latin(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// Normalize a label to a camelCase ASCII key.
///
/// Words are split on anything that is not an ASCII letter or digit. Returns
/// an empty string when nothing usable is left.
///
/// # Example
///
/// ```rust
/// use signal_scraper::extractor::normalize_label;
///
/// assert_eq!(normalize_label("Max drawdown:"), "maxDrawdown");
/// assert_eq!(normalize_label("Рост"), "rost");
/// ```
#[must_use]
pub fn normalize_label(label: &str) -> String {
    let latin = transliterate(label);
    let mut out = String::with_capacity(latin.len());

    for word in latin
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let lower = word.to_ascii_lowercase();
        if out.is_empty() {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

/// Label text as shown on the page, minus surrounding whitespace and a trailing colon.
#[must_use]
pub fn raw_label(label: &str) -> String {
    label.trim().trim_end_matches(':').trim_end().to_string()
}
