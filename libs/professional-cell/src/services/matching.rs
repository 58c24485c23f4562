//! Association of payment rows with the appointments they pay for.
//!
//! Appointment identifiers have been written in several shapes over time
//! (`42`, `00000042`, `APT-00000042`, `apt00000042`) and payment rows do not
//! necessarily reference an appointment in the same shape it was stored in.
//! [`LegacyIdMatcher`] joins on the digits of both sides; [`CanonicalIdMatcher`]
//! is a plain equality join for data written in one canonical format.

use std::collections::HashMap;
use std::sync::Arc;

use shared_config::PaymentMatchingMode;

use crate::models::{Appointment, Payment};

/// Digits of `raw` read as an integer. `None` when there are no digits or
/// they overflow.
pub fn numeric_core(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Picks the payment to trust among several for one appointment: a succeeded
/// payment over any other, then the most recently created.
pub fn authoritative_payment<'a, I>(candidates: I) -> Option<&'a Payment>
where
    I: IntoIterator<Item = &'a Payment>,
{
    candidates.into_iter().max_by(|a, b| {
        a.is_succeeded()
            .cmp(&b.is_succeeded())
            .then(a.created_at.cmp(&b.created_at))
    })
}

pub trait PaymentMatcher: Send + Sync {
    /// Authoritative payment per appointment id. Appointments without a
    /// matching payment are absent from the map.
    fn match_payments(&self, appointments: &[Appointment], payments: &[Payment]) -> HashMap<String, Payment>;
}

pub fn matcher_for(mode: PaymentMatchingMode) -> Arc<dyn PaymentMatcher> {
    match mode {
        PaymentMatchingMode::Legacy => Arc::new(LegacyIdMatcher),
        PaymentMatchingMode::Canonical => Arc::new(CanonicalIdMatcher),
    }
}

fn payment_reference(payment: &Payment) -> Option<&str> {
    payment
        .appointment_id
        .as_deref()
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
}

/// Joins on numeric cores. A reference in any of the written shapes (`42`,
/// `00000042`, `APT-00000042`, `apt00000042`) carries the same core as the
/// appointment, so core equality covers matching on those shapes too.
///
/// Each payment goes to exactly one appointment: the one whose identifier it
/// spells out verbatim, otherwise the earliest appointment sharing its core.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyIdMatcher;

impl PaymentMatcher for LegacyIdMatcher {
    fn match_payments(&self, appointments: &[Appointment], payments: &[Payment]) -> HashMap<String, Payment> {
        let mut by_core: HashMap<u64, Vec<usize>> = HashMap::new();
        for (index, appointment) in appointments.iter().enumerate() {
            if let Some(core) = numeric_core(&appointment.id) {
                by_core.entry(core).or_default().push(index);
            }
        }

        let mut assigned: Vec<Vec<&Payment>> = vec![Vec::new(); appointments.len()];

        for payment in payments {
            let Some(reference) = payment_reference(payment) else {
                continue;
            };
            let Some(candidates) = numeric_core(reference).and_then(|core| by_core.get(&core)) else {
                continue;
            };

            let owner = candidates
                .iter()
                .copied()
                .find(|&index| appointments[index].id == reference)
                .or_else(|| candidates.first().copied());

            if let Some(owner) = owner {
                assigned[owner].push(payment);
            }
        }

        appointments
            .iter()
            .zip(assigned)
            .filter_map(|(appointment, candidates)| {
                authoritative_payment(candidates).map(|payment| (appointment.id.clone(), payment.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalIdMatcher;

impl PaymentMatcher for CanonicalIdMatcher {
    fn match_payments(&self, appointments: &[Appointment], payments: &[Payment]) -> HashMap<String, Payment> {
        let mut by_reference: HashMap<&str, Vec<&Payment>> = HashMap::new();
        for payment in payments {
            if let Some(reference) = payment_reference(payment) {
                by_reference.entry(reference).or_default().push(payment);
            }
        }

        appointments
            .iter()
            .filter_map(|appointment| {
                let candidates = by_reference.get(appointment.id.as_str())?;
                authoritative_payment(candidates.iter().copied())
                    .map(|payment| (appointment.id.clone(), payment.clone()))
            })
            .collect()
    }
}
