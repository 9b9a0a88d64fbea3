//! Column-to-field mapping resolution.
//!
//! Auto-mapping compares normalized header text against normalized field
//! keys and labels. Resolution is deterministic: headers are visited in
//! file order and, for each header, fields in declaration order; the
//! first field that matches wins.

use indexmap::IndexMap;

use crate::imports::field::FieldDef;

/// Ordered spreadsheet header to field key map. An empty field key marks
/// the column as deliberately ignored.
pub type ColumnMapping = IndexMap<String, String>;

/// Header used by generated templates for the marker column. Never mapped.
pub const METADATA_MARKER_HEADER: &str = "meta";

/// Lowercase and strip everything except ASCII letters and digits.
pub fn normalize_key(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Whether a header is the reserved template marker column.
pub fn is_metadata_marker(header: &str) -> bool {
    normalize_key(header) == METADATA_MARKER_HEADER
}

/// Whether a mapping entry assigns the column to a field.
pub fn is_mapped(field_key: &str) -> bool {
    !field_key.trim().is_empty()
}

/// Suggest a mapping for every header that resembles a field.
///
/// A header matches a field when its normalized form equals the field's
/// normalized key or label, or contains either of them. Headers that match
/// nothing are left out of the result.
pub fn auto_map(headers: &[String], fields: &[FieldDef]) -> ColumnMapping {
    let normalized_fields: Vec<(&FieldDef, String, String)> = fields
        .iter()
        .map(|f| (f, normalize_key(&f.key), normalize_key(&f.label)))
        .collect();

    let mut mapping = ColumnMapping::new();
    for header in headers {
        let normalized = normalize_key(header);
        if normalized.is_empty() || normalized == METADATA_MARKER_HEADER {
            continue;
        }
        let matched = normalized_fields.iter().find(|(_, key, label)| {
            header_matches(&normalized, key) || header_matches(&normalized, label)
        });
        if let Some((field, _, _)) = matched {
            mapping.insert(header.clone(), field.key.clone());
        }
    }
    mapping
}

fn header_matches(header: &str, candidate: &str) -> bool {
    !candidate.is_empty() && (header == candidate || header.contains(candidate))
}

/// Layer explicit overrides on top of a suggested mapping.
///
/// Override entries win. Headers already present keep their position; new
/// headers are appended in override order.
pub fn merge_overrides(auto: &ColumnMapping, overrides: &ColumnMapping) -> ColumnMapping {
    let mut merged = auto.clone();
    for (header, field_key) in overrides {
        merged.insert(header.clone(), field_key.clone());
    }
    merged
}

/// Restrict a saved template's mapping to the headers present in a file.
pub fn apply_template(headers: &[String], template: &ColumnMapping) -> ColumnMapping {
    headers
        .iter()
        .filter_map(|h| template.get(h).map(|key| (h.clone(), key.clone())))
        .collect()
}

/// Resolve the effective mapping: auto-map, then the template (if any),
/// then explicit overrides.
pub fn resolve(
    headers: &[String],
    fields: &[FieldDef],
    template: Option<&ColumnMapping>,
    overrides: &ColumnMapping,
) -> ColumnMapping {
    let mut mapping = auto_map(headers, fields);
    if let Some(template) = template {
        mapping = merge_overrides(&mapping, &apply_template(headers, template));
    }
    merge_overrides(&mapping, overrides)
}

/// Reverse lookup: the header currently mapped to `field_key`.
pub fn header_for_field<'a>(mapping: &'a ColumnMapping, field_key: &str) -> Option<&'a str> {
    mapping
        .iter()
        .find(|(_, key)| key.as_str() == field_key)
        .map(|(header, _)| header.as_str())
}

/// Headers present in the file that have no mapping entry.
pub fn unmapped_headers<'a>(headers: &'a [String], mapping: &ColumnMapping) -> Vec<&'a str> {
    headers
        .iter()
        .filter(|h| !is_metadata_marker(h))
        .filter(|h| mapping.get(h.as_str()).map_or(true, |k| !is_mapped(k)))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::field::FieldType;

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn member_fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("fullName", "Full Name", FieldType::Text),
            FieldDef::new("email", "Email", FieldType::Email),
            FieldDef::new("amountPaid", "Dues Paid", FieldType::Number),
        ]
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_key("Full Name"), "fullname");
        assert_eq!(normalize_key("E-mail Address!"), "emailaddress");
        assert_eq!(normalize_key("Café"), "caf");
    }

    #[test]
    fn auto_map_matches_labels_and_keys() {
        let mapping = auto_map(
            &headers(&["Full Name", "Email", "Dues Paid"]),
            &member_fields(),
        );
        assert_eq!(mapping.get("Full Name").map(String::as_str), Some("fullName"));
        assert_eq!(mapping.get("Email").map(String::as_str), Some("email"));
        assert_eq!(mapping.get("Dues Paid").map(String::as_str), Some("amountPaid"));
    }

    #[test]
    fn auto_map_uses_containment() {
        let mapping = auto_map(&headers(&["Primary Email Address"]), &member_fields());
        assert_eq!(
            mapping.get("Primary Email Address").map(String::as_str),
            Some("email")
        );
    }

    #[test]
    fn auto_map_skips_marker_and_unknown_headers() {
        let mapping = auto_map(&headers(&["__meta__", "Favourite Colour", "!!!"]), &member_fields());
        assert!(mapping.is_empty());
    }

    #[test]
    fn first_declared_field_wins_ties() {
        let fields = vec![
            FieldDef::new("name", "Name", FieldType::Text),
            FieldDef::new("fullName", "Full Name", FieldType::Text),
        ];
        let mapping = auto_map(&headers(&["Full Name"]), &fields);
        assert_eq!(mapping.get("Full Name").map(String::as_str), Some("name"));
    }

    #[test]
    fn auto_map_is_deterministic() {
        let h = headers(&["Email", "Full Name", "Dues Paid", "Notes"]);
        let first = auto_map(&h, &member_fields());
        for _ in 0..5 {
            assert_eq!(auto_map(&h, &member_fields()), first);
        }
    }

    #[test]
    fn overrides_win_and_keep_position() {
        let auto = auto_map(&headers(&["Full Name", "Email"]), &member_fields());
        let mut overrides = ColumnMapping::new();
        overrides.insert("Email".into(), String::new());
        overrides.insert("Nickname".into(), "fullName".into());

        let merged = merge_overrides(&auto, &overrides);
        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Full Name", "Email", "Nickname"]);
        assert_eq!(merged["Email"], "");
        assert_eq!(merged["Nickname"], "fullName");
    }

    #[test]
    fn resolve_layers_template_then_overrides() {
        let h = headers(&["Name On Card", "Email", "Paid"]);
        let mut template = ColumnMapping::new();
        template.insert("Name On Card".into(), "fullName".into());
        template.insert("Paid".into(), "amountPaid".into());
        template.insert("Absent Column".into(), "email".into());
        let mut overrides = ColumnMapping::new();
        overrides.insert("Paid".into(), String::new());

        let mapping = resolve(&h, &member_fields(), Some(&template), &overrides);
        assert_eq!(mapping["Name On Card"], "fullName");
        assert_eq!(mapping["Email"], "email");
        assert_eq!(mapping["Paid"], "");
        assert!(!mapping.contains_key("Absent Column"));
        assert_eq!(unmapped_headers(&h, &mapping), vec!["Paid"]);
        assert_eq!(header_for_field(&mapping, "email"), Some("Email"));
    }
}
