//! Drug name canonicalization

/// Brand and alternate names mapped to the canonical generic name
const ALIASES: &[(&str, &str)] = &[
    ("acetaminophen", "paracetamol"),
    ("tylenol", "paracetamol"),
    ("panadol", "paracetamol"),
    ("calpol", "paracetamol"),
    ("crocin", "paracetamol"),
    ("dolo", "paracetamol"),
    ("asa", "aspirin"),
    ("acetylsalicylic acid", "aspirin"),
    ("disprin", "aspirin"),
    ("ecosprin", "aspirin"),
    ("coumadin", "warfarin"),
    ("jantoven", "warfarin"),
    ("advil", "ibuprofen"),
    ("motrin", "ibuprofen"),
    ("brufen", "ibuprofen"),
    ("nurofen", "ibuprofen"),
    ("viagra", "sildenafil"),
    ("gtn", "nitroglycerin"),
    ("glyceryl trinitrate", "nitroglycerin"),
    ("isosorbide mononitrate", "nitroglycerin"),
    ("zocor", "simvastatin"),
    ("biaxin", "clarithromycin"),
    ("klacid", "clarithromycin"),
    ("prozac", "fluoxetine"),
    ("ultram", "tramadol"),
    ("aldactone", "spironolactone"),
    ("zestril", "lisinopril"),
    ("prinivil", "lisinopril"),
    ("amoxil", "amoxicillin"),
    ("amoxycillin", "amoxicillin"),
    ("diflucan", "fluconazole"),
    ("plavix", "clopidogrel"),
    ("prilosec", "omeprazole"),
    ("losec", "omeprazole"),
];

/// Dosage-form and schedule words dropped from prescription entries
const NOISE_WORDS: &[&str] = &[
    "mg", "mcg", "g", "ml", "iu", "tab", "tabs", "tablet", "tablets", "cap", "caps", "capsule",
    "capsules", "syrup", "od", "bd", "bid", "tds", "tid", "qid", "prn", "daily", "oral", "po",
    "sr", "er", "xl",
];

/// Canonical lowercase generic name, or `None` if nothing drug-like remains.
///
/// Strips dose tokens ("500mg", "2", "x") and schedule words, then resolves
/// brand names. Unknown drugs keep their cleaned name.
pub fn canonical_drug(entry: &str) -> Option<String> {
    let lowered = entry.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '.' | '-'))
        .filter(|w| !w.is_empty())
        .filter(|w| !w.chars().any(|c| c.is_ascii_digit()))
        .filter(|w| !NOISE_WORDS.contains(w) && *w != "x")
        .collect();
    if words.is_empty() {
        return None;
    }

    let cleaned = words.join(" ");
    if let Some((_, generic)) = ALIASES.iter().find(|(alias, _)| *alias == cleaned) {
        return Some((*generic).to_string());
    }
    // "Tylenol Extra" style entries resolve on their first word
    if let Some((_, generic)) = ALIASES.iter().find(|(alias, _)| *alias == words[0]) {
        return Some((*generic).to_string());
    }
    Some(cleaned)
}

/// Canonicalize a list, keeping order and duplicates
pub fn canonical_drugs(entries: &[String]) -> Vec<String> {
    entries.iter().filter_map(|e| canonical_drug(e)).collect()
}
