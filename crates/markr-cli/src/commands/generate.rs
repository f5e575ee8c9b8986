//! The `markr generate` command.
//!
//! Produces a synthetic batch in the scanner's wire format. Roughly a quarter
//! of the entries rescan an existing student with a different obtained mark,
//! so the batch exercises duplicate reconciliation.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, FixedOffset, NaiveDate, TimeZone};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const FIRST_NAMES: &[&str] = &[
    "Alex", "Jamie", "Chris", "Jordan", "Taylor", "Morgan", "Casey", "Riley", "Skyler", "Drew",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Jones", "Williams", "Brown", "Davis", "Miller", "Wilson", "Moore", "Taylor",
    "Anderson",
];
const CHOICES: &[&str] = &["A", "B", "C", "D"];

/// Share of entries that rescan a student already in the batch.
const DUPLICATE_RATE: f64 = 0.25;
/// Answer elements written per entry, at most.
const MAX_ANSWERS: u32 = 5;

pub fn execute(records: usize, seed: Option<u64>, output: Option<PathBuf>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let xml = generate_batch(&mut rng, records);

    match output {
        Some(path) => {
            std::fs::write(&path, &xml)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Generated {records} records in {}", path.display());
        }
        None => print!("{xml}"),
    }

    Ok(())
}

struct Student {
    first_name: &'static str,
    last_name: &'static str,
    test_id: String,
    obtained: Vec<u32>,
}

/// Build an XML document with `records` entries.
pub fn generate_batch(rng: &mut impl Rng, records: usize) -> String {
    let test_ids: Vec<String> = (0..(records / 10).max(10))
        .map(|_| rng.gen_range(1000..=99999).to_string())
        .collect();
    let mut students: HashMap<String, Student> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<mcq-test-results>\n");
    for _ in 0..records {
        let available = rng.gen_range(10..=100u32);

        let rescan = if !order.is_empty() && rng.gen_bool(DUPLICATE_RATE) {
            order.choose(rng).cloned()
        } else {
            None
        };

        let student_number = match rescan {
            Some(number) => number,
            None => {
                let number = format!("{:06}", rng.gen_range(10000..=99999u32));
                if !students.contains_key(&number) {
                    let test_id = test_ids.choose(rng).cloned().unwrap_or_default();
                    students.insert(
                        number.clone(),
                        Student {
                            first_name: FIRST_NAMES.choose(rng).copied().unwrap_or("Alex"),
                            last_name: LAST_NAMES.choose(rng).copied().unwrap_or("Smith"),
                            test_id,
                            obtained: Vec::new(),
                        },
                    );
                    order.push(number.clone());
                }
                number
            }
        };

        let Some(student) = students.get_mut(&student_number) else {
            continue;
        };
        let obtained = distinct_mark(rng, available, &student.obtained);
        student.obtained.push(obtained);

        write_entry(
            &mut xml,
            rng,
            &student_number,
            student,
            available,
            obtained,
        );
    }
    xml.push_str("</mcq-test-results>\n");
    xml
}

/// An obtained mark in `0..=available`, different from earlier scans where
/// the range allows it.
fn distinct_mark(rng: &mut impl Rng, available: u32, earlier: &[u32]) -> u32 {
    let free: Vec<u32> = (0..=available).filter(|m| !earlier.contains(m)).collect();
    match free.choose(rng) {
        Some(&mark) => mark,
        None => rng.gen_range(0..=available),
    }
}

fn write_entry(
    xml: &mut String,
    rng: &mut impl Rng,
    student_number: &str,
    student: &Student,
    available: u32,
    obtained: u32,
) {
    let _ = writeln!(
        xml,
        "\t<mcq-test-result scanned-on=\"{}\">",
        random_scanned_on(rng)
    );
    let _ = writeln!(xml, "\t\t<first-name>{}</first-name>", student.first_name);
    let _ = writeln!(xml, "\t\t<last-name>{}</last-name>", student.last_name);
    let _ = writeln!(xml, "\t\t<student-number>{student_number}</student-number>");
    let _ = writeln!(xml, "\t\t<test-id>{}</test-id>", student.test_id);
    let _ = writeln!(
        xml,
        "\t\t<summary-marks available=\"{available}\" obtained=\"{obtained}\" />"
    );
    for question in 1..=available.min(MAX_ANSWERS) {
        let awarded = u32::from(rng.gen_bool(0.5));
        let choice = CHOICES.choose(rng).copied().unwrap_or("A");
        let _ = writeln!(
            xml,
            "\t\t<answer question=\"{question}\" marks-available=\"1\" marks-awarded=\"{awarded}\">{choice}</answer>"
        );
    }
    xml.push_str("\t</mcq-test-result>\n");
}

/// A scan time between 2015 and 2024 with a whole-hour offset in -11..=11.
fn random_scanned_on(rng: &mut impl Rng) -> String {
    let days = rng.gen_range(0..3650);
    let seconds = rng.gen_range(0..86_400);
    let offset_hours = rng.gen_range(-11..=11);

    let base = NaiveDate::from_ymd_opt(2015, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
        + Duration::days(days)
        + Duration::seconds(seconds);
    match FixedOffset::east_opt(offset_hours * 3600)
        .and_then(|tz| tz.from_local_datetime(&base).single())
    {
        Some(dt) => dt.to_rfc3339(),
        None => base.and_utc().to_rfc3339(),
    }
}
