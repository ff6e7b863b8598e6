use log::debug;
use lore_protocol::IntentClass;
use lore_protocol::IntentClassification;
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Classifies a query into exactly one intent class.
///
/// Pure lexical-signal matching against fixed keyword sets; no state is
/// updated as a side effect, so identical inputs always produce identical
/// output. On signal collision the precedence is fixed: doc_lookup >
/// code_location > module_health > research > general. Compliance and
/// location answers are cheap and unambiguous; research is the only class
/// allowed to reach the network and must never fire speculatively.
pub struct IntentClassifier {
    protocol_ref: Regex,
}

/// Precedence order. `General` is the fallback and carries no keywords.
const PRECEDENCE: [IntentClass; 4] = [
    IntentClass::DocLookup,
    IntentClass::CodeLocation,
    IntentClass::ModuleHealth,
    IntentClass::Research,
];

fn keywords_for(class: IntentClass) -> &'static [&'static str] {
    match class {
        IntentClass::DocLookup => &[
            "compliant",
            "compliance",
            "violation",
            "violates",
            "policy",
            "protocol",
            "standard",
            "regulation",
            "mandated",
            "license",
        ],
        IntentClass::CodeLocation => &[
            "where is",
            "where are",
            "where does",
            "location of",
            "which file",
            "which module",
            "defined in",
            "implementation of",
            "locate",
        ],
        IntentClass::ModuleHealth => &[
            "health",
            "oversized",
            "too large",
            "file size",
            "orphan",
            "dead code",
            "structure",
            "complexity",
            "bloated",
        ],
        IntentClass::Research => &[
            "research",
            "state of the art",
            "industry practice",
            "compare alternatives",
            "look up",
            "online",
            "upstream documentation",
            "latest release",
        ],
        IntentClass::General => &[],
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            // Protocol/standard references like "RFC 7231" or "PEP-8" count
            // toward doc_lookup even without a compliance keyword.
            protocol_ref: Regex::new(r"\b(?:rfc|pep|iso|ieee)[ -]?\d+\b").expect("Valid regex"),
        }
    }

    /// Classify a query. Total and single-valued: every input maps to
    /// exactly one class.
    pub fn classify(
        &self,
        raw_text: &str,
        context: &BTreeMap<String, String>,
    ) -> IntentClassification {
        let haystack = build_haystack(raw_text, context);

        let mut matched: BTreeMap<IntentClass, BTreeSet<String>> = BTreeMap::new();
        for class in PRECEDENCE {
            let mut signals = BTreeSet::new();
            for keyword in keywords_for(class) {
                if haystack.contains(keyword) {
                    signals.insert(format!("{class}:{keyword}"));
                }
            }
            if class == IntentClass::DocLookup {
                for reference in self.protocol_ref.find_iter(&haystack) {
                    signals.insert(format!("doc_lookup:ref:{}", reference.as_str().trim()));
                }
            }
            if !signals.is_empty() {
                matched.insert(class, signals);
            }
        }

        let (intent_class, matched_signals) = PRECEDENCE
            .into_iter()
            .find_map(|class| {
                matched
                    .get(&class)
                    .map(|signals| (class, signals.clone()))
            })
            .unwrap_or((IntentClass::General, BTreeSet::new()));

        let confidence = confidence_for(intent_class, matched_signals.len());

        debug!(
            "classified '{raw_text}' as {intent_class} (confidence {confidence:.2}, {} signals)",
            matched_signals.len()
        );

        IntentClassification {
            intent_class,
            confidence,
            matched_signals,
        }
    }
}

/// Lowercased query text plus caller-supplied context values. Context hints
/// can add signals but never change the precedence order.
fn build_haystack(raw_text: &str, context: &BTreeMap<String, String>) -> String {
    let mut haystack = raw_text.to_lowercase();
    for value in context.values() {
        haystack.push(' ');
        haystack.push_str(&value.to_lowercase());
    }
    haystack
}

/// Monotone in signal count, clamped to [0, 1]. The keyword-free fallback
/// class gets a fixed low confidence.
fn confidence_for(class: IntentClass, signal_count: usize) -> f32 {
    if class == IntentClass::General {
        return 0.25;
    }
    (0.4 + 0.2 * signal_count as f32).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(text: &str) -> IntentClassification {
        IntentClassifier::new().classify(text, &BTreeMap::new())
    }

    #[test]
    fn test_code_location_detection() {
        let classification = classify("where is the auth module");
        assert_eq!(classification.intent_class, IntentClass::CodeLocation);
        assert!(classification.confidence >= 0.4);
        assert!(
            classification
                .matched_signals
                .contains("code_location:where is")
        );
    }

    #[test]
    fn test_doc_lookup_detection() {
        let classification = classify("is this retry loop compliant with our policy?");
        assert_eq!(classification.intent_class, IntentClass::DocLookup);
    }

    #[test]
    fn test_protocol_reference_counts_as_doc_lookup() {
        let classification = classify("does our date parsing follow RFC 3339?");
        assert_eq!(classification.intent_class, IntentClass::DocLookup);
        assert!(
            classification
                .matched_signals
                .iter()
                .any(|signal| signal.starts_with("doc_lookup:ref:rfc"))
        );
    }

    #[test]
    fn test_module_health_detection() {
        let classification = classify("report on handler file size and orphan functions");
        assert_eq!(classification.intent_class, IntentClass::ModuleHealth);
        assert!(classification.matched_signals.len() >= 2);
    }

    #[test]
    fn test_research_detection() {
        let classification = classify("research how other projects shard their queues");
        assert_eq!(classification.intent_class, IntentClass::Research);
    }

    #[test]
    fn test_general_fallback() {
        let classification = classify("thanks, looks good");
        assert_eq!(classification.intent_class, IntentClass::General);
        assert!(classification.matched_signals.is_empty());
        assert_eq!(classification.confidence, 0.25);
    }

    #[test]
    fn test_collision_precedence() {
        // Both doc_lookup ("compliance") and code_location ("where is")
        // fire; doc_lookup wins by fixed precedence.
        let classification = classify("where is the compliance check for uploads");
        assert_eq!(classification.intent_class, IntentClass::DocLookup);

        // module_health beats research.
        let classification = classify("research why this file is oversized");
        assert_eq!(classification.intent_class, IntentClass::ModuleHealth);
    }

    #[test]
    fn test_context_hints_add_signals() {
        let mut context = BTreeMap::new();
        context.insert("task".to_string(), "verify policy compliance".to_string());
        let classification = IntentClassifier::new().classify("review the uploader", &context);
        assert_eq!(classification.intent_class, IntentClass::DocLookup);
    }

    #[test]
    fn test_repeated_calls_identical() {
        let classifier = IntentClassifier::new();
        let context = BTreeMap::new();
        let first = classifier.classify("where is the retry handler", &context);
        let second = classifier.classify("where is the retry handler", &context);
        assert_eq!(first, second);
    }

    #[test]
    fn test_confidence_monotone_in_signals() {
        let one = classify("locate the uploader");
        let two = classify("locate the uploader, where is it defined in the tree");
        assert!(two.matched_signals.len() > one.matched_signals.len());
        assert!(two.confidence >= one.confidence);
    }
}
