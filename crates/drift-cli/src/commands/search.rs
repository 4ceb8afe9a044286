use crate::commands::common::{
    format_note_lines, normalize_search_query, note_to_list_item, AppContext, NoteListItem,
};
use crate::error::CliError;

pub async fn run_search(
    context: &AppContext,
    query: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let normalized_query = normalize_search_query(query)?;
    let mut notes = context.search_service().search(&normalized_query).await?;
    notes.truncate(limit);

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if notes.is_empty() {
        println!("No matches for '{normalized_query}'.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
