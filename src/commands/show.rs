use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::tool::RecordClient;

pub fn run(dir: &Path, id: &str, isolated: bool, format: Format) -> Result<()> {
    let invoker = super::open_invoker(dir, isolated)?;
    let record = RecordClient::new(&invoker).show(id)?;
    output::print_record(&record, format)?;
    Ok(())
}
