//! Normalization of typed or scanned pump identifiers (barcode, QR code
//! URL, label text).

use reqwest::Url;
use uuid::Uuid;

use crate::models::pump::Pump;

const URL_QUERY_KEYS: [&str; 5] = ["pump", "pumpNumber", "code", "id", "p"];

pub fn normalize_pump_input(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return String::new();
    }

    if let Some(from_url) = extract_from_url(value) {
        return clean_token(&from_url);
    }

    clean_token(best_token(value))
}

/// Splits a pasted or multi-scan buffer into individual entries.
pub fn split_batch(raw: &str) -> Vec<String> {
    raw.split(['\r', '\n', '\t', ',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn matches_search(pump_number: &str, raw_search: &str) -> bool {
    let needle = normalize_pump_input(raw_search);
    needle.is_empty() || pump_number.to_uppercase().contains(&needle)
}

/// Picks the pump a scan refers to: an exact number match wins over a
/// partial one. Pumps already on the order are skipped.
pub fn resolve_scan<'a>(candidates: &'a [Pump], chosen: &[Uuid], normalized: &str) -> Option<&'a Pump> {
    if normalized.is_empty() {
        return None;
    }

    let open: Vec<&Pump> = candidates
        .iter()
        .filter(|pump| !chosen.contains(&pump.id))
        .collect();

    open.iter()
        .find(|pump| pump.pump_number.to_uppercase() == normalized)
        .or_else(|| {
            open.iter()
                .find(|pump| pump.pump_number.to_uppercase().contains(normalized))
        })
        .copied()
}

fn extract_from_url(value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return None;
    }

    let url = Url::parse(value).ok()?;

    for key in URL_QUERY_KEYS {
        let found = url
            .query_pairs()
            .find(|(name, val)| name == key && !val.is_empty())
            .map(|(_, val)| val.into_owned());
        if found.is_some() {
            return found;
        }
    }

    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

fn best_token(value: &str) -> &str {
    let parts: Vec<&str> = value
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '|'))
        .filter(|part| !part.is_empty())
        .collect();

    parts
        .iter()
        .find(|part| has_alpha(part) && has_digit(part))
        .or_else(|| parts.iter().find(|part| has_digit(part)))
        .or_else(|| parts.first())
        .copied()
        .unwrap_or(value)
}

fn has_digit(part: &str) -> bool {
    part.chars().any(|c| c.is_ascii_digit())
}

fn has_alpha(part: &str) -> bool {
    part.chars().any(|c| c.is_ascii_alphabetic())
}

fn clean_token(value: &str) -> String {
    let upper = value.trim().to_uppercase();
    let stripped = match upper.strip_prefix("PUMP") {
        Some(rest) => rest.trim_start_matches(|c: char| matches!(c, '#' | ':' | '-') || c.is_whitespace()),
        None => upper.as_str(),
    };

    stripped
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '/'))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{matches_search, normalize_pump_input, resolve_scan, split_batch};
    use crate::models::pump::{MaintenanceChecks, Pump, PumpStatus};

    fn pump(seed: u128, number: &str) -> Pump {
        Pump {
            id: Uuid::from_u128(seed),
            pump_number: number.to_string(),
            brand: None,
            pharmacy_id: Uuid::from_u128(99),
            status: PumpStatus::Available,
            active: true,
            maintenance_due: false,
            maintenance: MaintenanceChecks::default(),
            maintenance_due_at: None,
            maintenance_updated_at: None,
            maintenance_completed_at: None,
            created_by: "test".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn strips_pump_prefix_and_noise() {
        assert_eq!(normalize_pump_input("  pump# ab-12 "), "AB-12");
        assert_eq!(normalize_pump_input("PUMP: 0042"), "0042");
        assert_eq!(normalize_pump_input("a.b*c7"), "ABC7");
        assert_eq!(normalize_pump_input("   "), "");
    }

    #[test]
    fn prefers_alphanumeric_token() {
        assert_eq!(normalize_pump_input("LOT 123 SN XK900"), "XK900");
        assert_eq!(normalize_pump_input("serial | 5521"), "5521");
        assert_eq!(normalize_pump_input("infusion device"), "INFUSION");
    }

    #[test]
    fn reads_pump_number_from_qr_url() {
        assert_eq!(
            normalize_pump_input("https://labels.example.com/scan?foo=1&pumpNumber=xk-77"),
            "XK-77"
        );
        assert_eq!(
            normalize_pump_input("https://labels.example.com/scan?pump=A1&id=B2"),
            "A1"
        );
        assert_eq!(normalize_pump_input("HTTP://labels.example.com/p/ZZ-9/"), "ZZ-9");
    }

    #[test]
    fn batch_splits_on_separators() {
        assert_eq!(split_batch("A1\nB2;C3,\tD4\r\n"), vec!["A1", "B2", "C3", "D4"]);
        assert!(split_batch(" ,;\n").is_empty());
    }

    #[test]
    fn exact_match_beats_partial_and_skips_chosen() {
        let pumps = vec![pump(1, "XK-100"), pump(2, "XK-10"), pump(3, "XK-1000")];

        let exact = resolve_scan(&pumps, &[], "XK-10").unwrap();
        assert_eq!(exact.id, Uuid::from_u128(2));

        let partial = resolve_scan(&pumps, &[Uuid::from_u128(2)], "XK-10").unwrap();
        assert_eq!(partial.id, Uuid::from_u128(1));

        assert!(resolve_scan(&pumps, &[], "NOPE").is_none());
        assert!(resolve_scan(&pumps, &[], "").is_none());
    }

    #[test]
    fn search_is_case_insensitive_and_empty_matches_all() {
        assert!(matches_search("xk-100", "xk-1"));
        assert!(matches_search("XK-100", ""));
        assert!(!matches_search("XK-100", "ZZ"));
    }
}
