//! Property-based tests for the edit state machine

use super::*;
use crate::session::{Message, Role, Session, Settings};
use proptest::prelude::*;

fn arb_content() -> impl Strategy<Value = String> {
    "[a-zA-Z]([a-zA-Z ]{0,28}[a-zA-Z])?"
}

/// A session whose active chat holds `turns` alternating user/assistant messages
fn arb_session() -> impl Strategy<Value = (Session, String)> {
    prop::collection::vec(arb_content(), 0..10).prop_map(|turns| {
        let mut session = Session::new(Settings::default());
        let chat_id = session.active_chat_id().to_string();
        for (i, content) in turns.into_iter().enumerate() {
            let message = if i % 2 == 0 {
                Message::user(content)
            } else {
                Message::assistant(content, None)
            };
            session.append_message(&chat_id, message).unwrap();
        }
        (session, chat_id)
    })
}

/// Apply effects the way the controller does, minus the turn itself
fn apply(session: &mut Session, effects: &[Effect]) -> usize {
    let mut turns = 0;
    for effect in effects {
        match effect {
            Effect::EditMessage {
                chat_id,
                message_id,
                content,
            } => {
                session.edit_message(chat_id, message_id, content).unwrap();
            }
            Effect::TruncateAfter { chat_id, index } => {
                session.truncate_after(chat_id, *index).unwrap();
            }
            Effect::RequestTurn { .. } => turns += 1,
            Effect::BranchChat {
                chat_id,
                message_id,
            } => {
                session.branch_chat(chat_id, message_id).unwrap();
            }
        }
    }
    turns
}

proptest! {
    #[test]
    fn prop_redo_only_when_last_is_reply((session, chat_id) in arb_session()) {
        let chat = session.chat(&chat_id).unwrap();
        let ends_with_reply = chat.last().is_some_and(|m| m.role == Role::Assistant);
        let len = chat.len();

        let event = Event::Redo { chat_id: chat_id.clone() };
        let result = transition(&EditState::Viewing, &session, event).unwrap();

        if ends_with_reply && len >= 2 {
            let mut next = session.clone();
            prop_assert_eq!(apply(&mut next, &result.effects), 1);
            let chat = next.chat(&chat_id).unwrap();
            prop_assert_eq!(chat.len(), len - 1);
            prop_assert_eq!(chat.last().map(|m| m.role), Some(Role::User));
        } else {
            prop_assert!(result.effects.is_empty());
        }
    }

    #[test]
    fn prop_save_user_edit_keeps_prefix(
        (session, chat_id) in arb_session(),
        pick in any::<prop::sample::Index>(),
        draft in arb_content(),
    ) {
        let chat = session.chat(&chat_id).unwrap();
        let users: Vec<usize> = chat
            .messages()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i)
            .collect();
        prop_assume!(!users.is_empty());
        let index = users[pick.index(users.len())];
        let original = chat.clone();
        prop_assume!(original.messages()[index].content != draft);

        let state = EditState::Editing {
            chat_id: chat_id.clone(),
            message_id: original.messages()[index].id.clone(),
            draft: draft.clone(),
        };
        let result = transition(&state, &session, Event::SaveEdit).unwrap();
        prop_assert_eq!(&result.new_state, &EditState::Viewing);

        let mut next = session.clone();
        prop_assert_eq!(apply(&mut next, &result.effects), 1);
        let edited = next.chat(&chat_id).unwrap();
        prop_assert_eq!(edited.len(), index + 1);
        prop_assert_eq!(&edited.messages()[index].content, &draft);
        for (a, b) in edited.messages()[..index].iter().zip(original.messages()) {
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn prop_branch_never_touches_edit_state(
        (session, chat_id) in arb_session(),
        pick in any::<prop::sample::Index>(),
    ) {
        let chat = session.chat(&chat_id).unwrap();
        let target = chat.messages()[pick.index(chat.len())].id.clone();
        let state = EditState::Editing {
            chat_id: chat_id.clone(),
            message_id: chat.messages()[0].id.clone(),
            draft: "draft".to_string(),
        };

        let event = Event::Branch { chat_id, message_id: target };
        let result = transition(&state, &session, event).unwrap();
        prop_assert!(!result.requests_turn());
        prop_assert_eq!(&result.new_state, &state);
    }

    #[test]
    fn prop_cancel_always_views((session, chat_id) in arb_session()) {
        let chat = session.chat(&chat_id).unwrap();
        let state = EditState::Editing {
            chat_id: chat_id.clone(),
            message_id: chat.messages()[0].id.clone(),
            draft: "x".to_string(),
        };
        for s in [EditState::Viewing, state] {
            let result = transition(&s, &session, Event::CancelEdit).unwrap();
            prop_assert_eq!(&result.new_state, &EditState::Viewing);
            prop_assert!(result.effects.is_empty());
        }
    }
}
