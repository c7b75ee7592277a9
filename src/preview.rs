use anyhow::Result;
use log::info;

use crate::{cli::PreviewArgs, reader, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let rows = reader::read_path(&args.input, &args.input_options.read_options()?)?;
    let columns = rows.columns();
    println!("Rows: {}", rows.len());
    println!("Columns: {}", columns.join(", "));
    if !rows.is_empty() {
        print!("{}", table::render_rowset(&rows, args.rows));
    }
    info!(
        "Displayed {} of {} row(s) from {:?}",
        rows.len().min(args.rows),
        rows.len(),
        args.input
    );
    Ok(())
}
