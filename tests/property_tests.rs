/// Property-based tests using proptest
/// Tests invariants of query parsing and field validators for arbitrary input
use proptest::prelude::*;

use mewayz_api::crypto::{fingerprint, FieldCipher, generate_key};
use mewayz_api::query::{FilterField, ListQuery, PageLimits};
use mewayz_api::validation::{is_hostname, is_ip_or_cidr, is_valid_email, normalize_phone};

const FIELDS: &[FilterField] = &[
    FilterField::one_of("status", &["new", "contacted"]),
    FilterField::number("score"),
    FilterField::text("name"),
    FilterField::date("closedAt"),
];

const LIMITS: PageLimits = PageLimits {
    default_limit: 20,
    max_limit: 100,
};

// Property: query parsing never panics and accepted pages respect the bounds
proptest! {
    #[test]
    fn list_query_parsing_never_panics(key in "\\PC{0,16}", value in "\\PC{0,16}") {
        let _ = ListQuery::parse(&[(key, value)], FIELDS, LIMITS);
    }

    #[test]
    fn accepted_limits_are_within_bounds(limit in 0u32..500, page in 0u32..50) {
        let pairs = vec![
            ("limit".to_string(), limit.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        match ListQuery::parse(&pairs, FIELDS, LIMITS) {
            Ok(query) => {
                prop_assert!(query.limit >= 1 && query.limit <= LIMITS.max_limit);
                prop_assert!(query.page >= 1);
            }
            Err(_) => prop_assert!(limit == 0 || limit > LIMITS.max_limit || page == 0),
        }
    }

    #[test]
    fn numeric_range_filters_parse(n in -1.0e6f64..1.0e6) {
        let pairs = vec![("score[gte]".to_string(), n.to_string())];
        let query = ListQuery::parse(&pairs, FIELDS, LIMITS).unwrap();
        prop_assert_eq!(query.filters.len(), 1);
    }

    #[test]
    fn unknown_fields_are_rejected(name in "[a-z]{3,10}") {
        prop_assume!(!["status", "score", "name", "page", "limit", "sort"].contains(&name.as_str()));
        prop_assume!(!name.starts_with("closed"));
        let pairs = vec![(name, "x".to_string())];
        prop_assert!(ListQuery::parse(&pairs, FIELDS, LIMITS).is_err());
    }
}

// Property: validators never panic and accept well-formed values
proptest! {
    #[test]
    fn validators_never_panic(input in "\\PC*") {
        let _ = is_valid_email(&input);
        let _ = is_hostname(&input);
        let _ = is_ip_or_cidr(&input);
        let _ = normalize_phone(&input, phonenumber::country::Id::US);
    }

    #[test]
    fn simple_emails_are_valid(
        local in "[a-z]{1,10}",
        domain in "[a-z]{1,10}",
        tld in "[a-z]{2,4}"
    ) {
        let email = format!("{}@{}.{}", local, domain, tld);
        prop_assert!(is_valid_email(&email));
    }

    #[test]
    fn ipv4_cidrs_are_valid(a in 0u8..=255, b in 0u8..=255, prefix in 0u8..=32) {
        let cidr = format!("{}.{}.0.0/{}", a, b, prefix);
        prop_assert!(is_ip_or_cidr(&cidr));
    }

    #[test]
    fn ipv4_prefixes_over_32_are_invalid(prefix in 33u8..=200) {
        let cidr = format!("10.0.0.0/{}", prefix);
        prop_assert!(!is_ip_or_cidr(&cidr));
    }
}

// Property: encryption round-trips and fingerprints are stable
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sealed_values_decrypt_to_plaintext(plaintext in "\\PC{0,64}") {
        let cipher = FieldCipher::from_base64_key(&generate_key()).unwrap();
        let sealed = cipher.encrypt(&plaintext).unwrap();
        prop_assert!(FieldCipher::is_encrypted(&sealed));
        prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext.clone());
        prop_assert_eq!(fingerprint(&plaintext).len(), 16);
    }
}
