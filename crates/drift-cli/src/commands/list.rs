use crate::commands::common::{
    display_sorted, format_note_lines, note_to_list_item, AppContext, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(context: &AppContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let mut notes = display_sorted(context.store.load().await?);
    notes.truncate(limit);

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if notes.is_empty() {
        println!("No notes yet. Try `drift add \"my first note\"`.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
