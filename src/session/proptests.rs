//! Property-based tests for session mutations

use super::types::*;
use proptest::prelude::*;

fn arb_content() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,80}".prop_filter("non-blank", |s| !s.trim().is_empty())
}

/// Alternating user/assistant contents, starting with a user turn
fn arb_turns() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_content(), 1..12)
}

fn seeded(turns: &[String]) -> (Session, String) {
    let mut session = Session::new(Settings::default());
    let chat_id = session.active_chat_id().to_string();
    for (i, content) in turns.iter().enumerate() {
        let message = if i % 2 == 0 {
            Message::user(content.clone())
        } else {
            Message::assistant(content.clone(), None)
        };
        session.append_message(&chat_id, message).unwrap();
    }
    (session, chat_id)
}

proptest! {
    #[test]
    fn prop_append_preserves_order_and_title(turns in arb_turns()) {
        let (session, chat_id) = seeded(&turns);
        let chat = session.chat(&chat_id).unwrap();

        prop_assert_eq!(chat.len(), turns.len() + 1);
        prop_assert_eq!(chat.messages()[0].role, Role::System);
        for (message, content) in chat.messages()[1..].iter().zip(&turns) {
            prop_assert_eq!(&message.content, content);
        }

        let title = &chat.title;
        let first = turns[0].split_whitespace().collect::<Vec<_>>().join(" ");
        if first.chars().count() <= TITLE_MAX_CHARS {
            prop_assert_eq!(title, &first);
        } else {
            prop_assert!(title.ends_with(TITLE_ELLIPSIS));
            prop_assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
            let stem = title.trim_end_matches(TITLE_ELLIPSIS);
            prop_assert!(first.starts_with(stem));
        }
    }

    #[test]
    fn prop_branch_copies_prefix_only(turns in arb_turns(), pick in any::<prop::sample::Index>()) {
        let (mut session, chat_id) = seeded(&turns);
        let source = session.chat(&chat_id).unwrap().clone();
        let index = pick.index(source.len());
        let message_id = source.messages()[index].id.clone();

        let branch = session.branch_chat(&chat_id, &message_id).unwrap();

        prop_assert_eq!(session.active_chat_id(), branch.id.as_str());
        prop_assert_eq!(branch.len(), index + 1);
        prop_assert_eq!(session.chat(&chat_id).unwrap(), &source);
        for (copied, original) in branch.messages().iter().zip(source.messages()) {
            prop_assert_eq!(&copied.content, &original.content);
            prop_assert_eq!(copied.role, original.role);
        }
        prop_assert_eq!(&branch.title, &derive_title(branch.messages()));
    }

    #[test]
    fn prop_truncate_keeps_system_prompt(
        turns in arb_turns(),
        pick in any::<prop::sample::Index>(),
    ) {
        let (mut session, chat_id) = seeded(&turns);
        let len = session.chat(&chat_id).unwrap().len();
        let index = pick.index(len);

        session.truncate_after(&chat_id, index).unwrap();

        let chat = session.chat(&chat_id).unwrap();
        prop_assert_eq!(chat.len(), index + 1);
        prop_assert_eq!(chat.messages()[0].role, Role::System);
        prop_assert_eq!(&chat.title, &derive_title(chat.messages()));
    }
}
