//! Order identity extraction from opaque transaction references.
//!
//! Classification is an ordered rule list. The first rule whose hint or
//! prefix matches decides the order type, so prefixed forms always win over
//! the generic "first number anywhere" fallback.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of order a payment belongs to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    ServiceOrder,
    EcommerceOrder,
    ApartmentBooking,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::ServiceOrder => "service_order",
            OrderType::EcommerceOrder => "ecommerce_order",
            OrderType::ApartmentBooking => "apartment_booking",
        }
    }

    /// Human label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            OrderType::ServiceOrder => "service order",
            OrderType::EcommerceOrder => "order",
            OrderType::ApartmentBooking => "booking",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved `(order_type, order_id)` pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIdentity {
    pub order_type: OrderType,
    pub order_id: u64,
}

impl fmt::Display for OrderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.order_type.label(), self.order_id)
    }
}

/// A prefix and the longer prefixes it must not be read as the tail of.
struct Prefix {
    text: &'static str,
    not_after: &'static [&'static str],
}

impl Prefix {
    const fn plain(text: &'static str) -> Self {
        Self { text, not_after: &[] }
    }

    const fn bare(text: &'static str, not_after: &'static [&'static str]) -> Self {
        Self { text, not_after }
    }

    /// Byte offsets just past every standalone occurrence of this prefix
    fn ends_in<'a>(&'a self, reference: &'a str) -> impl Iterator<Item = usize> + 'a {
        reference.match_indices(self.text).filter_map(move |(start, _)| {
            let lead = &reference[..start];
            if self.not_after.iter().any(|longer| lead.ends_with(longer)) {
                None
            } else {
                Some(start + self.text.len())
            }
        })
    }

    fn occurs_in(&self, reference: &str) -> bool {
        self.ends_in(reference).next().is_some()
    }

    /// Digits directly following the first occurrence that has any
    fn digits_after(&self, reference: &str) -> Option<u64> {
        self.ends_in(reference)
            .find_map(|end| leading_digits(&reference[end..]))
    }
}

/// One classification rule, evaluated in priority order
struct IdentityRule {
    hint: Option<&'static str>,
    prefixes: &'static [Prefix],
    order_type: OrderType,
}

impl IdentityRule {
    fn matches(&self, reference: &str, hint: Option<&str>) -> bool {
        let hinted = matches!((self.hint, hint), (Some(want), Some(got)) if want == got);
        hinted || self.prefixes.iter().any(|p| p.occurs_in(reference))
    }

    fn extract(&self, reference: &str) -> Option<u64> {
        self.prefixes
            .iter()
            .find_map(|p| p.digits_after(reference))
            .or_else(|| first_digit_run(reference))
    }
}

const RULES: &[IdentityRule] = &[
    IdentityRule {
        hint: Some("ecommerce"),
        prefixes: &[
            Prefix::plain("ecommerce_order_"),
            Prefix::bare("order_", &["ecommerce_", "service_"]),
        ],
        order_type: OrderType::EcommerceOrder,
    },
    IdentityRule {
        hint: Some("apartment"),
        prefixes: &[
            Prefix::plain("apartment_booking_"),
            Prefix::bare("booking_", &["apartment_"]),
        ],
        order_type: OrderType::ApartmentBooking,
    },
    IdentityRule {
        hint: Some("service"),
        prefixes: &[Prefix::plain("service_order_")],
        order_type: OrderType::ServiceOrder,
    },
    IdentityRule {
        hint: None,
        prefixes: &[Prefix::plain("flw_")],
        order_type: OrderType::ServiceOrder,
    },
];

/// Classify a transaction reference and extract its numeric order id.
///
/// Returns the default type with `None` when the reference holds no digits.
pub fn resolve_identity(reference: &str, hint: Option<&str>) -> (OrderType, Option<u64>) {
    let hint = hint.map(str::trim).filter(|h| !h.is_empty());

    let (order_type, order_id) = match RULES.iter().find(|r| r.matches(reference, hint)) {
        Some(rule) => (rule.order_type, rule.extract(reference)),
        None => (OrderType::default(), first_digit_run(reference)),
    };

    match order_id {
        Some(id) => (order_type, Some(id)),
        None => (OrderType::default(), None),
    }
}

/// Order ids are positive; a run of zeros counts as no id
fn leading_digits(s: &str) -> Option<u64> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok().filter(|&id| id > 0)
}

fn first_digit_run(s: &str) -> Option<u64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    leading_digits(&s[start..])
}
