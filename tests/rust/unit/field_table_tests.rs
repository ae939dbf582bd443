//! Unit tests for the field equivalence table
//!
//! Covers the embedded table's contents and the validation applied to
//! alternative tables loaded from YAML.

#[cfg(test)]
mod field_table_tests {
    use curproxy::cur_schema::{CurSchemaError, FieldEquivalenceTable, SchemaGeneration, SqlType};

    fn embedded() -> &'static FieldEquivalenceTable {
        FieldEquivalenceTable::embedded().expect("embedded table must load")
    }

    #[test]
    fn test_every_map_attribute_has_a_flat_v1_column() {
        let table = embedded();
        for entry in table.entries() {
            if let Some((container, key)) = entry.v2_expr.as_subscript() {
                let map_field = table.map_field(container).unwrap();
                assert_eq!(
                    table.v1_column_for_key(map_field, key),
                    entry.v1_name,
                    "subscript {}['{}'] must map back to its V1 column",
                    container,
                    key
                );
            }
        }
    }

    #[test]
    fn test_lookups_in_both_directions() {
        let table = embedded();
        let entry = table.v1_entry("product_operating_system").unwrap();
        assert_eq!(entry.v2_expr.to_sql(), "product['operating_system']");

        let entry = table.v2_flat_entry("line_item_usage_amount").unwrap();
        assert_eq!(entry.v1_name, "line_item_usage_amount");
        assert_eq!(entry.sql_type, SqlType::Double);
    }

    #[test]
    fn test_declared_types_per_layout() {
        let table = embedded();
        assert_eq!(
            table.declared_type("discount", SchemaGeneration::V2),
            Some(SqlType::map_of(SqlType::Double))
        );
        assert_eq!(
            table.declared_type("resource_tags_user_team", SchemaGeneration::V1),
            Some(SqlType::Varchar)
        );
        assert_eq!(table.declared_type("discount", SchemaGeneration::V1), None);
    }

    #[test]
    fn test_v1_defaults_exclude_map_containers() {
        let defaults = embedded().default_fields(SchemaGeneration::V1);
        assert!(defaults.contains("bill_payer_account_id"));
        assert!(defaults.contains("product_region"));
        assert!(!defaults.contains("product"));
    }

    #[test]
    fn test_alternative_table_loads() {
        let yaml = r#"
version: "test-1"
map_fields:
  - { name: product, value_type: varchar }
fields:
  - { v1: line_item_usage_amount, type: double, default: true }
  - { v1: product_sku_family, v2: "product['sku_family']", type: varchar }
"#;
        let table = FieldEquivalenceTable::from_yaml(yaml).unwrap();
        assert_eq!(table.version(), "test-1");
        assert_eq!(table.entries().len(), 2);
        assert!(table.is_map_field("product"));
    }

    #[test]
    fn test_duplicate_v1_name_is_rejected() {
        let yaml = r#"
version: "test-2"
map_fields: []
fields:
  - { v1: line_item_usage_amount, type: double }
  - { v1: line_item_usage_amount, type: double }
"#;
        let err = FieldEquivalenceTable::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, CurSchemaError::FieldTableEntry { ref entry, .. } if entry == "line_item_usage_amount"));
    }

    #[test]
    fn test_unknown_container_is_rejected() {
        let yaml = r#"
version: "test-3"
map_fields: []
fields:
  - { v1: product_region, v2: "product['region']", type: varchar }
"#;
        let err = FieldEquivalenceTable::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("not a known map container"));
    }

    #[test]
    fn test_unparseable_expression_is_rejected() {
        let yaml = r#"
version: "test-4"
map_fields: []
fields:
  - { v1: broken, v2: "product['region'", type: varchar }
"#;
        assert!(FieldEquivalenceTable::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let err = FieldEquivalenceTable::from_yaml("fields: [").unwrap_err();
        assert!(matches!(err, CurSchemaError::FieldTableParse { .. }));
    }
}
