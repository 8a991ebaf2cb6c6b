//! # ODRL Vocabulary Helpers
//!
//! Term normalization for the ODRL 2.2 namespace and the default action
//! inclusion hierarchy (`odrl:includedIn`) from the ODRL Common Vocabulary.

/// The ODRL 2.2 namespace IRI.
pub const ODRL_NS: &str = "http://www.w3.org/ns/odrl/2/";

/// The compact prefix conventionally bound to [`ODRL_NS`].
pub const ODRL_PREFIX: &str = "odrl:";

/// Strip the ODRL namespace (full IRI or `odrl:` prefix) from a term.
///
/// Terms from other namespaces are returned unchanged, so `duc:train`
/// stays `duc:train` while `odrl:use` and
/// `http://www.w3.org/ns/odrl/2/use` both become `use`.
pub fn local_name(term: &str) -> &str {
    term.strip_prefix(ODRL_NS)
        .or_else(|| term.strip_prefix(ODRL_PREFIX))
        .unwrap_or(term)
}

/// `(child, parent)` pairs: the child action is included in the parent.
///
/// A subset of the ODRL Common Vocabulary. `use` and `transfer` are the
/// two roots.
pub const DEFAULT_ACTION_HIERARCHY: &[(&str, &str)] = &[
    ("aggregate", "use"),
    ("annotate", "use"),
    ("anonymize", "use"),
    ("archive", "use"),
    ("concurrentUse", "use"),
    ("derive", "use"),
    ("digitize", "use"),
    ("display", "use"),
    ("distribute", "use"),
    ("execute", "use"),
    ("grantUse", "use"),
    ("index", "use"),
    ("install", "use"),
    ("modify", "use"),
    ("move", "use"),
    ("play", "use"),
    ("present", "use"),
    ("print", "use"),
    ("read", "use"),
    ("reproduce", "use"),
    ("extract", "reproduce"),
    ("textToSpeech", "use"),
    ("transform", "use"),
    ("translate", "use"),
    ("give", "transfer"),
    ("sell", "transfer"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_odrl_namespace() {
        assert_eq!(local_name("odrl:use"), "use");
        assert_eq!(local_name("http://www.w3.org/ns/odrl/2/lteq"), "lteq");
        assert_eq!(local_name("use"), "use");
    }

    #[test]
    fn leaves_foreign_namespaces() {
        assert_eq!(local_name("duc:train"), "duc:train");
        assert_eq!(local_name("http://example.com/odrl:x"), "http://example.com/odrl:x");
    }
}
