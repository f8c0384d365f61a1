use crate::engine::core::planning::{Batch, BatchPlanner};
use crate::engine::types::InputFile;
use crate::shared::config::MergeConfig;
use std::path::Path;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

fn files(sizes: &[u64]) -> Vec<InputFile> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, size)| InputFile::new(format!("spectra_{}.json", i), *size))
        .collect()
}

fn planner(max_files_per_batch: usize) -> BatchPlanner {
    BatchPlanner::new(MergeConfig {
        max_files_per_batch,
        ..MergeConfig::default()
    })
}

#[test]
fn three_small_files_with_pair_limit() {
    let input = files(&[10 * KB, 0, 10 * KB]);
    let plan = planner(2).plan(&input, 100 * MB);

    assert_eq!(plan.files_per_batch, 2);
    assert_eq!(plan.total_batches(), 2);
    assert_eq!(plan.batches[0].files, input[..2].to_vec());
    assert_eq!(plan.batches[1].files, input[2..].to_vec());
    assert_eq!(plan.batches[0].record_caps, vec![None, None]);
    assert_eq!(plan.budget_bytes, 20 * MB);
}

#[test]
fn budget_formula_limits_batch_size() {
    // budget 20 MB, each file expands to 2.5 MB
    let input = files(&[MB; 20]);
    let plan = planner(100).plan(&input, 100 * MB);

    assert_eq!(plan.files_per_batch, 8);
    assert_eq!(plan.total_batches(), 3);
    assert_eq!(plan.batches[2].len(), 4);
    assert_eq!(plan.total_files(), 20);
}

#[test]
fn oversized_file_is_planned_alone_with_cap() {
    let input = files(&[500 * MB, 400 * MB]);
    let plan = planner(100).plan(&input, 100 * MB);

    assert_eq!(plan.files_per_batch, 1);
    assert_eq!(plan.total_batches(), 2);
    assert!(plan.batches.iter().all(|b| b.record_caps == vec![Some(2000)]));
}

#[test]
fn oversized_file_among_small_ones_gets_its_own_batch() {
    // avg is about 3 MB, so two files per batch; the 60 MB file expands to
    // 150 MB against a 20 MB budget
    let mut sizes = vec![100 * KB; 20];
    sizes.insert(1, 60 * MB);
    let input = files(&sizes);
    let plan = planner(100).plan(&input, 100 * MB);

    assert_eq!(plan.files_per_batch, 2);
    assert_eq!(plan.batches[0].files, input[..1].to_vec());
    assert_eq!(plan.batches[0].record_caps, vec![None]);
    assert_eq!(plan.batches[1].files, input[1..2].to_vec());
    assert_eq!(plan.batches[1].record_cap(0), Some(2000));
    assert_eq!(plan.batches[2].files, input[2..4].to_vec());
    assert_eq!(plan.batches[2].record_caps, vec![None, None]);
    assert!(
        plan.batches
            .iter()
            .filter(|b| b.number != 2)
            .all(|b| b.record_caps.iter().all(Option::is_none))
    );

    let numbers: Vec<usize> = plan.batches.iter().map(|b| b.number).collect();
    assert_eq!(numbers, (1..=plan.total_batches()).collect::<Vec<_>>());
    let planned: Vec<InputFile> = plan.batches.iter().flat_map(|b| b.files.clone()).collect();
    assert_eq!(planned, input);
    assert!(!plan.batches.iter().any(Batch::is_empty));
}

#[test]
fn no_available_memory_still_plans() {
    let input = files(&[10 * KB, 10 * KB, 10 * KB]);
    let plan = planner(100).plan(&input, 0);

    assert_eq!(plan.files_per_batch, 1);
    assert_eq!(plan.total_batches(), 3);
}

#[test]
fn all_zero_byte_files_use_max_batch() {
    let input = files(&[0, 0, 0, 0, 0]);
    let plan = planner(2).plan(&input, 100 * MB);

    assert_eq!(plan.files_per_batch, 2);
    assert_eq!(plan.total_batches(), 3);
}

#[test]
fn empty_input_gives_empty_plan() {
    let plan = planner(100).plan(&[], 100 * MB);

    assert!(plan.is_empty());
    assert_eq!(plan.last_number(), 0);
}

#[test]
fn planning_is_idempotent() {
    let input = files(&[3 * MB, 12 * KB, 7 * MB, 0, 900 * KB, 40 * MB, 5 * MB]);
    let planner = planner(3);

    let first = planner.plan(&input, 512 * MB);
    let second = planner.plan(&input, 512 * MB);

    assert_eq!(first, second);
}

#[test]
fn numbering_and_names_follow_offset() {
    let input = files(&[KB, KB, KB]);
    let plan = planner(1).plan_from(&input, 100 * MB, 4);

    let numbers: Vec<usize> = plan.batches.iter().map(|b| b.number).collect();
    assert_eq!(numbers, vec![4, 5, 6]);
    assert_eq!(plan.last_number(), 6);
    assert_eq!(
        plan.batches[0].output_path(Path::new("/out"), "merged_spectra"),
        Path::new("/out/merged_spectra_batch_004.json")
    );
}
