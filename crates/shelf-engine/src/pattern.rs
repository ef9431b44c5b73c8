use shelf_record::{FieldValue, ObjectRecord};
use shelf_types::TypeSystem;

/// Whether `candidate` satisfies the query-by-example `pattern`.
///
/// The candidate's type must be the pattern's type or a subtype of it, and
/// every field set on the pattern must be equal on the candidate. A
/// reference-list field matches when the pattern's list is a subset of the
/// candidate's. Fields the pattern does not set are unconstrained; a field
/// the pattern sets but the candidate lacks never matches.
pub fn matches_pattern(
    candidate: &ObjectRecord,
    pattern: &ObjectRecord,
    types: &dyn TypeSystem,
) -> bool {
    let Some(candidate_type) = types.type_key_for_tag(candidate.oid.type_tag()) else {
        return false;
    };
    let Some(pattern_type) = types.type_key_for_tag(pattern.oid.type_tag()) else {
        return false;
    };
    if !types.is_subtype(&candidate_type, &pattern_type) {
        return false;
    }

    pattern.fields.iter().all(|(name, wanted)| {
        candidate
            .field(name)
            .is_some_and(|found| field_matches(wanted, found))
    })
}

fn field_matches(wanted: &FieldValue, found: &FieldValue) -> bool {
    match (wanted, found) {
        (FieldValue::ReferenceList(wanted), FieldValue::ReferenceList(found)) => {
            wanted.iter().all(|oid| found.contains(oid))
        }
        _ => wanted == found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_types::{Oid, StaticTypeSystem, TypeDescriptor, Version};

    fn types() -> StaticTypeSystem {
        StaticTypeSystem::builder()
            .add(TypeDescriptor::abstract_type("org.Party", "PTY"))
            .add(TypeDescriptor::concrete("org.Person", "PER").extends("org.Party"))
            .add(
                TypeDescriptor::concrete("org.Employee", "EMP")
                    .extends("org.Person")
                    .with_reference_list("reports"),
            )
            .add(TypeDescriptor::concrete("org.Company", "CMP").extends("org.Party"))
            .build()
            .unwrap()
    }

    fn record(tag: &str, id: &str) -> ObjectRecord {
        ObjectRecord::new(Oid::persistent(tag, id).unwrap(), Version::initial("u"))
    }

    fn pattern(tag: &str) -> ObjectRecord {
        ObjectRecord::new(Oid::transient(tag, "0").unwrap(), Version::initial("u"))
    }

    fn emp(id: &str) -> Oid {
        Oid::persistent("EMP", id).unwrap()
    }

    #[test]
    fn empty_pattern_matches_subtypes_only() {
        let types = types();
        let person = pattern("PER");
        assert!(matches_pattern(&record("PER", "1"), &person, &types));
        assert!(matches_pattern(&record("EMP", "1"), &person, &types));
        assert!(!matches_pattern(&record("CMP", "1"), &person, &types));
        assert!(matches_pattern(&record("CMP", "1"), &pattern("PTY"), &types));
    }

    #[test]
    fn unknown_tags_never_match() {
        let types = types();
        assert!(!matches_pattern(&record("XXX", "1"), &pattern("PER"), &types));
        assert!(!matches_pattern(&record("PER", "1"), &pattern("XXX"), &types));
    }

    #[test]
    fn scalar_and_reference_fields_must_be_equal() {
        let types = types();
        let candidate = record("EMP", "1")
            .with_scalar("name", "Fred")
            .with_reference("manager", emp("2"));

        assert!(matches_pattern(&candidate, &pattern("PER").with_scalar("name", "Fred"), &types));
        assert!(!matches_pattern(&candidate, &pattern("PER").with_scalar("name", "Joe"), &types));
        assert!(matches_pattern(
            &candidate,
            &pattern("EMP").with_reference("manager", emp("2")),
            &types
        ));
        assert!(!matches_pattern(
            &candidate,
            &pattern("EMP").with_reference("manager", emp("3")),
            &types
        ));
    }

    #[test]
    fn reference_list_uses_subset_rule() {
        let types = types();
        let candidate = record("EMP", "1").with_references("reports", vec![emp("2"), emp("3")]);
        let small = record("EMP", "4").with_references("reports", vec![emp("2")]);

        let wants_one = pattern("EMP").with_references("reports", vec![emp("3")]);
        let wants_two = pattern("EMP").with_references("reports", vec![emp("2"), emp("3")]);

        assert!(matches_pattern(&candidate, &wants_one, &types));
        assert!(matches_pattern(&candidate, &wants_two, &types));
        assert!(!matches_pattern(&small, &wants_two, &types));
        assert!(matches_pattern(
            &small,
            &pattern("EMP").with_references("reports", vec![]),
            &types
        ));
    }

    #[test]
    fn missing_candidate_field_does_not_match() {
        let types = types();
        let candidate = record("PER", "1");
        assert!(!matches_pattern(&candidate, &pattern("PER").with_scalar("name", "Fred"), &types));
    }

    #[test]
    fn variant_mismatch_does_not_match() {
        let types = types();
        let candidate = record("EMP", "1").with_reference("reports", emp("2"));
        let wants = pattern("EMP").with_references("reports", vec![emp("2")]);
        assert!(!matches_pattern(&candidate, &wants, &types));
    }
}
