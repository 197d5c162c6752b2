//! Resource naming helpers for the collection and join-field contracts.

/// The collection name for a resource type: lowercased and pluralised,
/// so `Patient` → `patients`, `ImagingStudy` → `imagingstudies`,
/// `NutritionOrder` → `nutritionorders`.
pub fn pluralize_lower_resource_name(resource: &str) -> String {
    let lower = resource.to_lowercase();
    pluralize(&lower)
}

fn pluralize(word: &str) -> String {
    let bytes = word.as_bytes();
    if let Some(&last) = bytes.last() {
        let second_last = bytes.len().checked_sub(2).map(|i| bytes[i]);
        match last {
            b'y' if !second_last.is_some_and(is_vowel) => {
                return format!("{}ies", &word[..word.len() - 1]);
            }
            b's' | b'x' | b'z' => return format!("{word}es"),
            b'h' if matches!(second_last, Some(b'c') | Some(b's')) => {
                return format!("{word}es");
            }
            _ => {}
        }
    }
    format!("{word}s")
}

fn is_vowel(b: u8) -> bool {
    matches!(b, b'a' | b'e' | b'i' | b'o' | b'u')
}

/// Uppercases the first letter of each word, so `subject` → `Subject` and
/// `general-practitioner` → `General-Practitioner`. Used to build the
/// `_included…`/`_revIncluded…` join-field names.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}
