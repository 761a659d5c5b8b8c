// Select command - show what a selection spec keeps

use anyhow::Result;

use super::read_test_list;
use crate::cli::args::SelectArgs;
use crate::selector;

pub fn handle_select(args: &SelectArgs) -> Result<()> {
    let all = read_test_list(&args.tests_file)?;
    let selected = selector::select(&all, &args.only, args.invert);

    if args.is_json() {
        let json = serde_json::json!({
            "total": all.len(),
            "selected": selected,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for identifier in &selected {
            println!("{}", identifier);
        }
    }

    Ok(())
}
