use crate::commands::common::{capture_editor_input, content_from_args_or_stdin, AppContext};
use crate::error::CliError;

pub async fn run_add(
    context: &AppContext,
    content_parts: &[String],
    title: Option<&str>,
    color: Option<&str>,
) -> Result<(), CliError> {
    let content = match content_from_args_or_stdin(content_parts)? {
        Some(content) => content,
        // A titled note may have an empty body; otherwise fall through to
        // the editor.
        None if title.is_some() => String::new(),
        None => capture_editor_input()?.ok_or(CliError::EmptyContent)?,
    };

    let note = context
        .note_service()
        .create(
            title.unwrap_or(""),
            &content,
            color.map(std::string::ToString::to_string),
        )
        .await?;

    println!("{}", note.id);
    Ok(())
}
