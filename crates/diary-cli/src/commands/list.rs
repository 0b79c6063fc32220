use crate::commands::common::{
    entry_to_list_item, format_day_header, format_entry_line, parse_day, EntryListItem,
};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_list(date: Option<&str>, as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let service = ctx.diary_service().await?;

    let days = match date {
        Some(date) => {
            let day = parse_day(date)?;
            let entries = service.entries_on(day).await?;
            if entries.is_empty() {
                Vec::new()
            } else {
                vec![(day, entries)]
            }
        }
        None => service.list_entries().await?.into_iter().rev().collect(),
    };

    if as_json {
        let json_items = days
            .iter()
            .flat_map(|(_, entries)| entries.iter().map(entry_to_list_item))
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if days.is_empty() {
        println!("No entries.");
    }
    for (day, entries) in &days {
        println!("{}", format_day_header(*day));
        for entry in entries {
            println!("{}", format_entry_line(entry));
        }
    }

    Ok(())
}
