//! Tree flattening
//!
//! Turns a parsed [`Node`] tree into `prefix_key = value` pairs. Path segments are
//! joined with `_` and hyphens become underscores, so
//! `metrics → [stressor: cpu] → bogo-ops` flattens to `metrics_cpu_bogo_ops`.

use super::Node;

/// Entry that names a sequence item instead of being reported as a value
pub const LABEL_KEY: &str = "stressor";

/// Flatten a tree into ordered `(key, value)` pairs
///
/// Sequence items holding a [`LABEL_KEY`] entry use its value as their path segment;
/// other items use their zero-based position. Only scalars produce pairs.
pub fn flatten(root: &Node) -> Vec<(String, String)> {
    let mut out = Vec::new();
    walk(root, "", &mut out);
    out
}

fn walk(node: &Node, prefix: &str, out: &mut Vec<(String, String)>) {
    match node {
        Node::Scalar(value) => {
            if !prefix.is_empty() {
                out.push((prefix.to_string(), value.clone()));
            }
        }
        Node::Map(entries) => {
            for (key, child) in entries {
                walk(child, &join(prefix, key), out);
            }
        }
        Node::List(items) => {
            for (idx, item) in items.iter().enumerate() {
                match item.get(LABEL_KEY).and_then(Node::as_scalar) {
                    Some(label) => {
                        let prefix = join(prefix, label);
                        if let Node::Map(entries) = item {
                            for (key, child) in entries.iter().filter(|(k, _)| k != LABEL_KEY) {
                                walk(child, &join(&prefix, key), out);
                            }
                        }
                    }
                    None => walk(item, &join(prefix, &idx.to_string()), out),
                }
            }
        }
    }
}

fn join(prefix: &str, segment: &str) -> String {
    let segment = normalize(segment);
    if prefix.is_empty() {
        segment
    } else {
        format!("{}_{}", prefix, segment)
    }
}

/// Normalize a key segment (`bogo-ops` → `bogo_ops`)
pub fn normalize(segment: &str) -> String {
    segment.trim().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn pairs(text: &str) -> Vec<(String, String)> {
        flatten(&parse_document(text).unwrap())
    }

    #[test]
    fn test_flatten_single_stressor_entry() {
        let flat = pairs(concat!(
            "metrics:\n",
            "    - stressor: cpu\n",
            "      bogo-ops-per-second-real-time: 12.5\n",
        ));
        assert_eq!(
            flat,
            vec![("metrics_cpu_bogo_ops_per_second_real_time".to_string(), "12.5".to_string())]
        );
    }

    #[test]
    fn test_flatten_sections_in_order() {
        let text = "\
---
system-info:
      stress-ng-version: 0.15.06
metrics:
    - stressor: cpu
      bogo-ops: 100
    - stressor: memrate
      bogo-ops: 200
...
";
        let keys: Vec<String> = pairs(text).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "system_info_stress_ng_version",
                "metrics_cpu_bogo_ops",
                "metrics_memrate_bogo_ops",
            ]
        );
    }

    #[test]
    fn test_flatten_unlabelled_items_use_index() {
        let flat = pairs("items:\n  - size: 1\n  - size: 2\n");
        assert_eq!(
            flat,
            vec![
                ("items_0_size".to_string(), "1".to_string()),
                ("items_1_size".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_flatten_skips_empty_maps() {
        assert!(pairs("empty:\n").is_empty());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("bogo-ops-per-second"), "bogo_ops_per_second");
        assert_eq!(normalize(" cpu "), "cpu");
    }
}
