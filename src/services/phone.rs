//! Kenyan mobile number normalization.
//!
//! Daraja only accepts MSISDNs in the `2547XXXXXXXX` / `2541XXXXXXXX` form.
//! Members type numbers every which way, so everything entering the system
//! goes through [`normalize_phone`] first.

use crate::errors::{AppError, Result};

const COUNTRY_CODE: &str = "254";

/// Normalizes `07XXXXXXXX`, `+2547XXXXXXXX`, `2547XXXXXXXX` and the bare
/// subscriber number `7XXXXXXXX` (and the `1` ranges) to `254XXXXXXXXX`.
/// Spaces and hyphens used as separators are ignored.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();

    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    // A leading '+' is only meaningful with the country code.
    if compact.starts_with('+') && !digits.starts_with(COUNTRY_CODE) {
        return Err(invalid());
    }

    let subscriber = match digits.len() {
        12 => digits.strip_prefix(COUNTRY_CODE),
        10 => digits.strip_prefix('0'),
        9 => Some(digits),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if !(subscriber.starts_with('7') || subscriber.starts_with('1')) {
        return Err(invalid());
    }

    Ok(format!("{}{}", COUNTRY_CODE, subscriber))
}

fn invalid() -> AppError {
    AppError::invalid_data("Invalid phone number. Use the format 07XXXXXXXX or 2547XXXXXXXX")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_every_supported_format() {
        for input in ["0712345678", "+254712345678", "254712345678", "712345678"] {
            assert_eq!(normalize_phone(input).unwrap(), "254712345678", "{input}");
        }
        assert_eq!(normalize_phone("0110345678").unwrap(), "254110345678");
        assert_eq!(normalize_phone(" 0712 345 678 ").unwrap(), "254712345678");
        assert_eq!(normalize_phone("0712-345-678").unwrap(), "254712345678");
    }

    #[test]
    fn rejects_malformed_numbers() {
        for input in [
            "",
            "+",
            "071234567",
            "07123456789",
            "255712345678",
            "+0712345678",
            "0812345678",
            "07123a5678",
            "254-712-345-67",
            "++254712345678",
            "2547123456789",
        ] {
            assert!(normalize_phone(input).is_err(), "{input} should fail");
        }
    }

    proptest! {
        #[test]
        fn every_format_of_a_subscriber_normalizes_identically(
            lead in prop::sample::select(vec!['7', '1']),
            rest in "[0-9]{8}",
        ) {
            let subscriber = format!("{}{}", lead, rest);
            let canonical = format!("254{}", subscriber);

            prop_assert_eq!(normalize_phone(&format!("0{}", subscriber)).unwrap(), canonical.clone());
            prop_assert_eq!(normalize_phone(&format!("+254{}", subscriber)).unwrap(), canonical.clone());
            prop_assert_eq!(normalize_phone(&format!("254{}", subscriber)).unwrap(), canonical.clone());
            prop_assert_eq!(normalize_phone(&subscriber).unwrap(), canonical);
        }

        #[test]
        fn output_is_always_canonical(input in "\\PC{0,16}") {
            if let Ok(normalized) = normalize_phone(&input) {
                prop_assert_eq!(normalized.len(), 12);
                prop_assert!(normalized.starts_with("254"));
                prop_assert!(normalized.bytes().all(|b| b.is_ascii_digit()));
            }
        }

        #[test]
        fn wrong_lengths_always_fail(digits in "[0-9]{1,8}|[0-9]{13,16}") {
            prop_assert!(normalize_phone(&digits).is_err());
        }
    }
}
