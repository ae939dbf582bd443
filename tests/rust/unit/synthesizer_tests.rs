//! Unit tests for map assembly at the array literal ceiling

#[cfg(test)]
mod synthesizer_tests {
    use std::collections::BTreeSet;

    use curproxy::cur_schema::{FieldEquivalenceTable, SchemaGeneration};
    use curproxy::proxy::introspector::{collapse_array_concatenation, parse_map_keys};
    use curproxy::proxy::{ExpressionSynthesizer, Resolution, MAX_ARRAY_LITERAL_ELEMENTS};

    fn assemble(key_count: usize) -> String {
        let table = FieldEquivalenceTable::embedded().unwrap();
        let exists = |c: &str| c.ends_with('0');
        let synthesizer = ExpressionSynthesizer::new(table, SchemaGeneration::V2, &exists);
        let resolution = Resolution::MapAssembly {
            container: table.map_field("resource_tags").unwrap().clone(),
        };
        let keys: BTreeSet<String> = (0..key_count).map(|i| format!("user_k{:04}", i)).collect();
        let expression = synthesizer
            .synthesize("resource_tags", None, &resolution, &keys)
            .unwrap();
        format!("SELECT {} AS resource_tags FROM cur", expression)
    }

    #[test]
    fn test_group_count_is_ceiling_of_key_count() {
        for (keys, groups) in [(1, 1), (254, 1), (255, 2), (508, 2), (509, 3), (1000, 4)] {
            let sql = assemble(keys);
            assert_eq!(
                sql.matches("ARRAY[").count(),
                groups * 2,
                "{} keys should give {} groups per array",
                keys,
                groups
            );
        }
    }

    #[test]
    fn test_keys_recovered_in_order_after_chunking() {
        let key_count = MAX_ARRAY_LITERAL_ELEMENTS * 2 + 17;
        let sql = assemble(key_count);

        let keys = parse_map_keys(&collapse_array_concatenation(&sql), "resource_tags").unwrap();
        assert_eq!(keys.len(), key_count);
        assert_eq!(keys.first().map(String::as_str), Some("user_k0000"));
        assert_eq!(keys.last().map(String::as_str), Some("user_k0524"));
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_values_stay_aligned_with_keys() {
        let sql = collapse_array_concatenation(&assemble(300));
        let values_start = sql.find("], ARRAY[").unwrap() + "], ARRAY[".len();
        let values_end = sql[values_start..].find(']').unwrap() + values_start;
        let values: Vec<&str> = sql[values_start..values_end].split(", ").collect();

        assert_eq!(values.len(), 300);
        assert_eq!(values[0], "resource_tags_user_k0000");
        assert_eq!(values[1], "cast(null as varchar)");
        assert_eq!(values[260], "resource_tags_user_k0260");
        assert_eq!(values[299], "cast(null as varchar)");
    }
}
