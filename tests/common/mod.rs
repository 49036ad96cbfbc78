use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const OPS_HEADER: [&str; 7] = ["op", "user", "bill", "actor", "arg", "value", "notes"];

/// Writes a batch scenario: one trusted vendor and `bills` small manual
/// bills, each bound to its own label. Amounts vary so totals differ
/// across rows.
pub fn generate_ops_csv(path: &Path, bills: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    let mut rng = rand::thread_rng();

    wtr.write_record(OPS_HEADER)?;
    wtr.write_record([
        "vendor",
        "acct-1",
        "",
        "",
        "Bulk Supplies Co",
        "methods=ach",
        "",
    ])?;

    for i in 1..=bills {
        let cents: u32 = rng.gen_range(100..=99_900);
        let amount = format!("{}.{:02}", cents / 100, cents % 100);
        wtr.write_record([
            "manual",
            "acct-1",
            &format!("b{i}"),
            "",
            "Bulk Supplies Co",
            &format!("amount={amount};due=2027-12-31"),
            "",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
