use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::{self, Write};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use nutrilog_core::assistant::{ChatRole, Conversation, NutritionAssistant};
use nutrilog_core::session::Session;

fn encode_image(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

fn print_reply(conversation: &Conversation) {
    let Some(msg) = conversation.last().filter(|m| m.role == ChatRole::Model) else {
        return;
    };
    if msg.is_error {
        eprintln!("{}", msg.text);
    } else {
        println!("{}\n", msg.text);
    }
}

fn print_totals(session: &Session) {
    let log = session.log_for(session.today());
    let t = &log.totals;
    let n = &session.targets().nutrients;
    let sync = session
        .sync_status()
        .map(|status| format!(" | sync: {status}"))
        .unwrap_or_default();
    println!(
        "[today] {:.0}/{:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g{sync}",
        t.calories, n.calories, t.protein, t.carbs, t.fat
    );
}

/// One message when `message` or `image` is given, otherwise an interactive
/// loop on stdin until EOF or `exit`.
pub(crate) async fn cmd_chat<A: NutritionAssistant>(
    session: &mut Session,
    assistant: &A,
    message: Option<String>,
    image: Option<&Path>,
) -> Result<()> {
    let mut conversation = session.open_conversation();
    for msg in &conversation.messages {
        println!("{}\n", msg.text);
    }

    if message.is_some() || image.is_some() {
        let image = image.map(encode_image).transpose()?;
        let text = message.unwrap_or_default();
        session
            .send_message(&mut conversation, assistant, &text, image)
            .await?;
        print_reply(&conversation);
        print_totals(session);
        return Ok(());
    }

    converse(
        session,
        assistant,
        &mut conversation,
        BufReader::new(tokio::io::stdin()),
    )
    .await
}

/// Reads without blocking the runtime so debounced pushes still fire while
/// the user is typing.
async fn converse<A: NutritionAssistant, R: AsyncBufRead + Unpin>(
    session: &mut Session,
    assistant: &A,
    conversation: &mut Conversation,
    input: R,
) -> Result<()> {
    let mut lines = input.lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }
        session
            .send_message(conversation, assistant, text, None)
            .await?;
        print_reply(conversation);
        print_totals(session);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrilog_core::assistant::AssistantRequest;
    use nutrilog_core::local_cache::LocalCache;

    struct Canned;

    impl NutritionAssistant for Canned {
        async fn analyze(&self, _request: &AssistantRequest<'_>) -> Result<String> {
            Ok("Logged a banana.\n```json\n{\"dailyTotals\": {\"calories\": 105, \"carbs\": 27}}\n```"
                .to_string())
        }
    }

    #[test]
    fn test_encode_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meal.jpg");
        std::fs::write(&path, b"hi").unwrap();
        assert_eq!(encode_image(&path).unwrap(), "aGk=");
        assert!(encode_image(&dir.path().join("missing.jpg")).is_err());
    }

    #[tokio::test]
    async fn test_single_message_applies_patch() {
        let mut session = Session::open(LocalCache::open_in_memory().unwrap(), None);
        cmd_chat(&mut session, &Canned, Some("a banana".into()), None)
            .await
            .unwrap();
        let log = session.log_for(session.today());
        assert_eq!(log.totals.calories, 105.0);
        assert_eq!(log.totals.carbs, 27.0);
    }

    #[tokio::test]
    async fn test_interactive_lines_until_exit() {
        let mut session = Session::open(LocalCache::open_in_memory().unwrap(), None);
        let mut conversation = Conversation::new();
        let input: &[u8] = b"a banana\n\n  \nexit\na second banana\n";
        converse(&mut session, &Canned, &mut conversation, input)
            .await
            .unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(session.log_for(session.today()).totals.calories, 105.0);
    }

    #[tokio::test]
    async fn test_interactive_stops_at_eof() {
        let mut session = Session::open(LocalCache::open_in_memory().unwrap(), None);
        let mut conversation = Conversation::new();
        let input: &[u8] = b"a banana\nanother";
        converse(&mut session, &Canned, &mut conversation, input)
            .await
            .unwrap();
        assert_eq!(conversation.messages.len(), 4);
    }
}
