//! Issuer deduplication.
//!
//! An issuer may list several instrument classes (common, preferred, units).
//! Only the listing with the highest tie-break value survives; the output
//! keeps the input order of the surviving rows.

use crate::domain::error::CarteiraError;
use crate::domain::instrument::{InstrumentRecord, TieBreakField, cmp_missing_last};
use std::cmp::Ordering;
use std::collections::HashMap;

pub fn dedupe(
    records: Vec<InstrumentRecord>,
    tie_break: TieBreakField,
) -> Result<Vec<InstrumentRecord>, CarteiraError> {
    if records.is_empty() {
        return Err(CarteiraError::empty_result("deduplication"));
    }

    tracing::info!(rows = records.len(), %tie_break, "filtering duplicated issuers");

    // issuer -> index of the current winner
    let mut winners: HashMap<&str, usize> = HashMap::new();
    for (i, rec) in records.iter().enumerate() {
        match winners.get(rec.issuer_code.as_str()) {
            None => {
                winners.insert(rec.issuer_code.as_str(), i);
            }
            Some(&best) => {
                let incumbent = records[best].tie_break_value(tie_break);
                let challenger = rec.tie_break_value(tie_break);
                // Strictly better only; an equal value keeps the earlier row.
                if cmp_missing_last(challenger, incumbent, true) == Ordering::Less {
                    winners.insert(rec.issuer_code.as_str(), i);
                }
            }
        }
    }

    let mut keep = vec![false; records.len()];
    for &i in winners.values() {
        keep[i] = true;
    }
    let dropped = records.len() - winners.len();

    let kept: Vec<InstrumentRecord> = records
        .into_iter()
        .zip(keep)
        .filter_map(|(rec, k)| k.then_some(rec))
        .collect();

    tracing::info!(kept = kept.len(), dropped, "issuer deduplication complete");
    Ok(kept)
}
