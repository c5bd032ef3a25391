use std::collections::HashSet;

use anyhow::Result;
use wsa_fulfillment::constants::*;
use wsa_fulfillment::{BatchProcessor, DataProcessor, Mode, RecordSet, Value};

fn orders(n: usize) -> RecordSet {
    RecordSet::from_rows(
        &[COL_ORDER_ID, COL_CRM_ORDER_TYPE, COL_DATE_CREATED, COL_WORKZONE],
        (0..n).map(|i| {
            let crm = if i % 4 == 3 { "CLOSE" } else { "CREATE" };
            vec![
                Value::text(format!("AO-{}", i)),
                Value::text(crm),
                Value::text(format!("2024-0{}-1{} 08:00:00", 1 + i % 2, i % 10)),
                Value::text(format!("ZONE-{}", i % 3)),
            ]
        }),
    )
}

#[test]
fn test_single_chunk_equals_single_pipeline() -> Result<()> {
    let data = orders(25);
    let existing: HashSet<String> = ["AO-4".to_string()].into_iter().collect();

    let processor = DataProcessor::for_mode(Mode::Wsa)?;
    let single = processor.process_all(data.clone(), &[1], &existing, None)?;

    let mut batch = BatchProcessor::new(processor, 100)?;
    let batched = batch.process_chunks(&data, &[1], &existing);

    assert!(batch.get_errors().is_empty());
    assert_eq!(batched.columns, single.records.columns);
    assert_eq!(batched.to_display_rows(), single.records.to_display_rows());
    assert_eq!(batch.get_stats().final_rows, single.stats.final_rows);
    assert_eq!(batch.get_stats().dropped_duplicates, 1);
    Ok(())
}

#[test]
fn test_chunked_stats_sum_to_input() -> Result<()> {
    let data = orders(25);
    let mut batch = BatchProcessor::new(DataProcessor::for_mode(Mode::Wsa)?, 7)?;

    let output = batch.process_chunks(&data, &[], &HashSet::new());
    let stats = batch.get_stats();

    assert_eq!(stats.raw_rows, 25);
    assert_eq!(stats.dropped_by_mode, 6);
    assert_eq!(stats.final_rows, output.len());
    assert_eq!(output.len(), 19);
    batch.ensure_no_errors()?;
    Ok(())
}
