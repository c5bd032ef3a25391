//! Mode-specific row selection.
//!
//! Each mode keeps rows whose order id matches the configured patterns and then
//! applies its own extra rule: WSA checks the CRM order type and back-fills
//! contact numbers, MODOROSO tags MO/DO and fills the partner, WAPPR checks the
//! status.

use std::collections::HashMap;
use tracing::debug;

use crate::config::ProcessorConfig;
use crate::types::{Mode, Record, RecordSet, Value};

/// Apply the mode's rules. Returns the kept set; the caller counts the drop.
pub fn apply(set: RecordSet, config: &ProcessorConfig) -> RecordSet {
    let RecordSet { mut columns, records } = set;
    let cols = &config.columns;

    let mut kept: Vec<Record> = records
        .into_iter()
        .filter(|r| matches_pattern(r, config))
        .filter(|r| match config.mode {
            Mode::Wsa => crm_type_allowed(r.get(&cols.crm_order_type), &config.crm_order_types),
            Mode::Wappr => status_allowed(r.get(&cols.status), &config.status_filter),
            Mode::Modoroso => true,
        })
        .collect();

    match config.mode {
        Mode::Wsa => {
            let has_contact = columns.contains(&cols.contact_number);
            let has_customer = columns.contains(&cols.customer_name);
            if has_contact && has_customer {
                fill_contact_numbers(&mut kept, &cols.customer_name, &cols.contact_number);
            }
        }
        Mode::Modoroso => {
            if columns.contains(&cols.crm_order_type) {
                for record in kept.iter_mut() {
                    let tag = mo_do_tag(record.get(&cols.order_id));
                    record.set(cols.crm_order_type.clone(), Value::text(tag));
                }
            }
            if let Some(partner) = &config.default_mitra {
                if !columns.contains(&cols.mitra) {
                    columns.push(cols.mitra.clone());
                }
                for record in kept.iter_mut() {
                    if record.get(&cols.mitra).is_null() {
                        record.set(cols.mitra.clone(), Value::text(partner.clone()));
                    }
                }
            }
        }
        Mode::Wappr => {}
    }

    RecordSet {
        columns,
        records: kept,
    }
}

fn matches_pattern(record: &Record, config: &ProcessorConfig) -> bool {
    match &config.order_pattern {
        Some(pattern) => {
            let id = record.get(&config.columns.order_id);
            !id.is_null() && pattern.is_match(&id.to_display())
        }
        None => true,
    }
}

fn crm_type_allowed(value: &Value, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let crm = value.to_display();
    let crm = crm.trim();
    allowed.iter().any(|a| a == crm)
}

fn status_allowed(value: &Value, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let status = value.to_display().trim().to_uppercase();
    allowed.iter().any(|a| a.to_uppercase() == status)
}

/// `MO` or `DO` from the order id; ids carrying neither count as `MO`
fn mo_do_tag(order_id: &Value) -> &'static str {
    let id = order_id.to_display().to_uppercase();
    if id.contains("-MO") {
        "MO"
    } else if id.contains("-DO") {
        "DO"
    } else {
        "MO"
    }
}

/// Blank contact numbers take the first number seen for the same customer
fn fill_contact_numbers(records: &mut [Record], customer_col: &str, contact_col: &str) {
    let mut by_customer: HashMap<String, Value> = HashMap::new();
    for record in records.iter() {
        let customer = record.get(customer_col);
        let contact = record.get(contact_col);
        if customer.is_null() || contact.is_null() {
            continue;
        }
        by_customer
            .entry(customer.to_display())
            .or_insert_with(|| contact.clone());
    }

    let mut filled = 0usize;
    for record in records.iter_mut() {
        if !record.get(contact_col).is_null() {
            continue;
        }
        let customer = record.get(customer_col);
        if customer.is_null() {
            continue;
        }
        if let Some(contact) = by_customer.get(&customer.to_display()) {
            record.set(contact_col, contact.clone());
            filled += 1;
        }
    }
    if filled > 0 {
        debug!("Filled {} contact numbers from customer mapping", filled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn set(columns: &[&str], rows: Vec<Vec<&str>>) -> RecordSet {
        RecordSet::from_rows(
            columns,
            rows.into_iter().map(|r| {
                r.into_iter()
                    .map(|c| if c.is_empty() { Value::Null } else { Value::text(c) })
                    .collect()
            }),
        )
    }

    #[test]
    fn test_wsa_keeps_matching_pattern_and_crm_type() {
        let config = ProcessorConfig::for_mode(Mode::Wsa).unwrap();
        let input = set(
            &[COL_ORDER_ID, COL_CRM_ORDER_TYPE],
            vec![
                vec!["AO-PDA-123", "CREATE"],
                vec!["AO-PDA-124", "CLOSE"],
                vec!["REG-999", "CREATE"],
                vec!["wsa-1", "MIGRATE"],
            ],
        );
        let out = apply(input, &config);
        let ids: Vec<String> = out.column_values(COL_ORDER_ID).map(|v| v.to_display()).collect();
        assert_eq!(ids, vec!["AO-PDA-123", "wsa-1"]);
    }

    #[test]
    fn test_wsa_crm_type_match_is_exact() {
        let config = ProcessorConfig::for_mode(Mode::Wsa).unwrap();
        let input = set(
            &[COL_ORDER_ID, COL_CRM_ORDER_TYPE],
            vec![
                vec!["AO-PDA-1", "create"],
                vec!["AO-PDA-2", "Migrate"],
                vec!["AO-PDA-3", " MIGRATE "],
            ],
        );
        let out = apply(input, &config);
        assert_eq!(out.len(), 1);
        assert_eq!(out.records[0].get(COL_ORDER_ID), &Value::text("AO-PDA-3"));
    }

    #[test]
    fn test_wsa_fills_contact_from_customer() {
        let config = ProcessorConfig::for_mode(Mode::Wsa).unwrap();
        let input = set(
            &[COL_ORDER_ID, COL_CRM_ORDER_TYPE, COL_CUSTOMER_NAME, COL_CONTACT_NUMBER],
            vec![
                vec!["AO1", "CREATE", "Budi", ""],
                vec!["AO2", "CREATE", "Budi", "628111111111"],
                vec!["AO3", "CREATE", "Budi", "628222222222"],
                vec!["AO4", "CREATE", "Sari", ""],
            ],
        );
        let out = apply(input, &config);
        assert_eq!(out.records[0].get(COL_CONTACT_NUMBER), &Value::text("628111111111"));
        assert!(out.records[3].get(COL_CONTACT_NUMBER).is_null());
    }

    #[test]
    fn test_modoroso_tags_and_fills_partner() {
        let config = ProcessorConfig::for_mode(Mode::Modoroso).unwrap();
        let input = set(
            &[COL_ORDER_ID, COL_CRM_ORDER_TYPE],
            vec![
                vec!["SC1-MO", "CREATE"],
                vec!["sc2-do", "CREATE"],
                vec!["SC3", "CREATE"],
            ],
        );
        let out = apply(input, &config);
        assert_eq!(out.len(), 2);
        assert!(out.has_column(COL_MITRA));
        assert_eq!(out.records[0].get(COL_CRM_ORDER_TYPE), &Value::text("MO"));
        assert_eq!(out.records[1].get(COL_CRM_ORDER_TYPE), &Value::text("DO"));
        assert_eq!(out.records[1].get(COL_MITRA), &Value::text("TSEL"));
    }

    #[test]
    fn test_modoroso_keeps_existing_partner() {
        let config = ProcessorConfig::for_mode(Mode::Modoroso).unwrap();
        let input = set(
            &[COL_ORDER_ID, COL_MITRA],
            vec![vec!["SC1-MO", "ISAT"], vec!["SC2-MO", ""]],
        );
        let out = apply(input, &config);
        assert_eq!(out.records[0].get(COL_MITRA), &Value::text("ISAT"));
        assert_eq!(out.records[1].get(COL_MITRA), &Value::text("TSEL"));
    }

    #[test]
    fn test_wappr_filters_status() {
        let config = ProcessorConfig::for_mode(Mode::Wappr).unwrap();
        let input = set(
            &[COL_ORDER_ID, COL_STATUS],
            vec![
                vec!["AO1", " wappr "],
                vec!["AO2", "COMPLETE"],
                vec!["PDA3", "WAPPR"],
            ],
        );
        let out = apply(input, &config);
        assert_eq!(out.len(), 2);
        assert_eq!(out.records[1].source_index, 2);
    }
}
