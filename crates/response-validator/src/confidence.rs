//! Confidence assignment

use clinical_protocol::Confidence;
use serde_json::Value;

/// Phrases that indicate the answer explains its reasoning
const REASONING_MARKERS: &[&str] = &[
    "because",
    "due to",
    "suggest",
    "indicat",
    "consistent with",
    "risk of",
    "therefore",
    "associated with",
];

/// Phrases that indicate the model is unsure
const HEDGES: &[&str] = &[
    "may be",
    "might",
    "possibly",
    "unclear",
    "not sure",
    "unsure",
    "cannot determine",
    "can't determine",
    "hard to say",
];

/// Parse a provider-reported confidence: a 0-1 score, a 0-100 percentage,
/// or a label.
pub fn confidence_from_reported(value: &Value) -> Option<Confidence> {
    match value {
        Value::Number(n) => {
            let mut score = n.as_f64()?;
            if score > 1.0 && score <= 100.0 {
                score /= 100.0;
            }
            if !(0.0..=1.0).contains(&score) {
                return None;
            }
            Some(if score >= 0.8 {
                Confidence::High
            } else if score >= 0.5 {
                Confidence::Medium
            } else {
                Confidence::Low
            })
        }
        Value::String(label) => match label.trim().to_lowercase().as_str() {
            "high" | "very high" => Some(Confidence::High),
            "medium" | "moderate" => Some(Confidence::Medium),
            "low" | "very low" => Some(Confidence::Low),
            other => other.parse::<f64>().ok().and_then(|n| {
                serde_json::Number::from_f64(n).and_then(|n| confidence_from_reported(&Value::Number(n)))
            }),
        },
        _ => None,
    }
}

/// Estimate confidence from the rationale text alone. Never returns High:
/// unreported confidence is capped at Medium.
pub fn heuristic_confidence(rationale: &str) -> Confidence {
    let text = rationale.to_lowercase();
    let mut score: i32 = 0;

    let chars = text.chars().count();
    if chars >= 80 {
        score += 1;
    }
    if chars >= 200 {
        score += 1;
    }

    let markers = REASONING_MARKERS.iter().filter(|m| text.contains(*m)).count();
    score += markers.min(2) as i32;

    let hedges = HEDGES.iter().filter(|h| text.contains(*h)).count();
    score -= 2 * hedges as i32;

    if score >= 2 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reported_scores() {
        assert_eq!(confidence_from_reported(&json!(0.92)), Some(Confidence::High));
        assert_eq!(confidence_from_reported(&json!(0.6)), Some(Confidence::Medium));
        assert_eq!(confidence_from_reported(&json!(0.1)), Some(Confidence::Low));
        assert_eq!(confidence_from_reported(&json!(85)), Some(Confidence::High));
        assert_eq!(confidence_from_reported(&json!(-3)), None);
    }

    #[test]
    fn test_reported_labels() {
        assert_eq!(confidence_from_reported(&json!("HIGH")), Some(Confidence::High));
        assert_eq!(confidence_from_reported(&json!("moderate")), Some(Confidence::Medium));
        assert_eq!(confidence_from_reported(&json!("0.55")), Some(Confidence::Medium));
        assert_eq!(confidence_from_reported(&json!("certain-ish")), None);
        assert_eq!(confidence_from_reported(&json!(null)), None);
    }

    #[test]
    fn test_heuristic_rewards_reasoning() {
        let reasoned = "Chest pain radiating to the jaw with sweating is consistent with an acute \
                        coronary syndrome because of the classic pattern; emergency ECG indicated.";
        assert_eq!(heuristic_confidence(reasoned), Confidence::Medium);
    }

    #[test]
    fn test_heuristic_penalizes_hedging() {
        let hedged = "It might be a cardiac issue, possibly musculoskeletal; it is unclear because \
                      the description is brief and consistent with several causes.";
        assert_eq!(heuristic_confidence(hedged), Confidence::Low);
        assert_eq!(heuristic_confidence("Rest."), Confidence::Low);
    }
}
