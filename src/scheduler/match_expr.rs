use std::collections::BTreeMap;

/// The four set-membership match operators this scheduler understands,
/// plus a closing `Unsupported` tag for everything else (notably `Gt`/
/// `Lt`, which the orchestrator supports but this scheduler explicitly
/// does not). Modeling the operator as a closed tagged sum means every
/// call site gets an exhaustive match instead of a string comparison
/// sprinkled through the codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    Unsupported,
}

impl MatchOperator {
    pub fn parse(operator: &str) -> MatchOperator {
        match operator {
            "In" => MatchOperator::In,
            "NotIn" => MatchOperator::NotIn,
            "Exists" => MatchOperator::Exists,
            "DoesNotExist" => MatchOperator::DoesNotExist,
            other => {
                log::warn!("unsupported match operator {other:?}, treating as unsatisfiable");
                MatchOperator::Unsupported
            }
        }
    }
}

/// Evaluates a single `(key, operator, values)` requirement against a
/// node/pod label map, per the node-affinity predicate in §4.7: `In`
/// (label value present among `values`), `NotIn` (label present and its
/// value absent from `values`), `Exists` (label present), `DoesNotExist`
/// (label absent). `Unsupported` always fails closed.
pub fn label_requirement_matches(
    labels: &BTreeMap<String, String>,
    key: &str,
    operator: MatchOperator,
    values: &[String],
) -> bool {
    match operator {
        MatchOperator::In => labels.get(key).map(|v| values.contains(v)).unwrap_or(false),
        MatchOperator::NotIn => labels
            .get(key)
            .map(|v| !values.contains(v))
            .unwrap_or(false),
        MatchOperator::Exists => labels.contains_key(key),
        MatchOperator::DoesNotExist => !labels.contains_key(key),
        MatchOperator::Unsupported => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn in_matches_when_value_present() {
        let l = labels(&[("zone", "z1")]);
        assert!(label_requirement_matches(
            &l,
            "zone",
            MatchOperator::In,
            &["z1".into(), "z2".into()]
        ));
    }

    #[test]
    fn in_fails_when_key_absent() {
        let l = labels(&[]);
        assert!(!label_requirement_matches(
            &l,
            "zone",
            MatchOperator::In,
            &["z1".into()]
        ));
    }

    #[test]
    fn not_in_requires_key_present_with_other_value() {
        let l = labels(&[("zone", "z3")]);
        assert!(label_requirement_matches(
            &l,
            "zone",
            MatchOperator::NotIn,
            &["z1".into(), "z2".into()]
        ));
        assert!(!label_requirement_matches(
            &BTreeMap::new(),
            "zone",
            MatchOperator::NotIn,
            &["z1".into()]
        ));
    }

    #[test]
    fn exists_and_does_not_exist() {
        let l = labels(&[("zone", "z1")]);
        assert!(label_requirement_matches(
            &l,
            "zone",
            MatchOperator::Exists,
            &[]
        ));
        assert!(!label_requirement_matches(
            &l,
            "missing",
            MatchOperator::Exists,
            &[]
        ));
        assert!(label_requirement_matches(
            &l,
            "missing",
            MatchOperator::DoesNotExist,
            &[]
        ));
    }

    #[test]
    fn unsupported_operator_fails_closed() {
        assert_eq!(MatchOperator::parse("Gt"), MatchOperator::Unsupported);
        assert!(!label_requirement_matches(
            &labels(&[("zone", "z1")]),
            "zone",
            MatchOperator::Unsupported,
            &["z1".into()]
        ));
    }
}
