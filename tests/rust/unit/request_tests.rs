//! Unit tests for field requests and how they land in the target layout

#[cfg(test)]
mod request_tests {
    use curproxy::cur_schema::{FieldEquivalenceTable, SchemaGeneration};
    use curproxy::proxy::{CompilationRequest, Exposure, FieldEquivalenceResolver, TargetField};

    fn table() -> &'static FieldEquivalenceTable {
        FieldEquivalenceTable::embedded().unwrap()
    }

    fn exposures(
        source: SchemaGeneration,
        target: SchemaGeneration,
        fields: &[&str],
    ) -> Vec<Exposure> {
        let resolver = FieldEquivalenceResolver::new(table(), source, target);
        CompilationRequest::parse(fields.iter().copied(), table())
            .unwrap()
            .fields()
            .map(|f| resolver.exposure_of(f))
            .collect()
    }

    #[test]
    fn test_map_key_in_v2_layout_is_a_key_of_its_container() {
        let got = exposures(
            SchemaGeneration::V2,
            SchemaGeneration::V2,
            &["resource_tags['user_team']"],
        );
        assert_eq!(got, vec![Exposure::map_key("resource_tags", "user_team")]);
    }

    #[test]
    fn test_map_key_in_v1_layout_is_a_flat_column() {
        let got = exposures(
            SchemaGeneration::V1,
            SchemaGeneration::V1,
            &["resource_tags['user_team']", "product['region']"],
        );
        assert_eq!(
            got,
            vec![
                Exposure::column("product_region"),
                Exposure::column("resource_tags_user_team"),
            ]
        );
    }

    #[test]
    fn test_default_request_for_v1_target() {
        let request = CompilationRequest::defaults(SchemaGeneration::V1, table());
        assert!(request
            .fields()
            .any(|f| f == &TargetField::Plain("identity_time_interval".to_string())));
        assert!(request
            .fields()
            .all(|f| matches!(f, TargetField::Plain(_))));
    }

    #[test]
    fn test_invalid_identifier_is_reported() {
        let err = CompilationRequest::parse(["product[region]"], table()).unwrap_err();
        assert!(err.to_string().contains("product[region]"));
    }
}
