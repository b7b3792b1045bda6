use forgebot::bot::ui_builder::{
    create_model_keyboard, create_quiz_answer_keyboard, format_quiz_feedback,
    MODEL_CALLBACK_PREFIX, QUIZ_ANSWER_PREFIX,
};
use forgebot::generation::{is_known_model, GenerationError};
use forgebot::quiz::{Epoch, QuizSessions};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardButtonKind};

fn callback_data(button: &InlineKeyboardButton) -> &str {
    match &button.kind {
        InlineKeyboardButtonKind::CallbackData(data) => data,
        other => panic!("expected a callback button, got {other:?}"),
    }
}

/// Every model button must round-trip through the callback handler's
/// parsing: strip the prefix, land on a catalog model.
#[test]
fn test_model_keyboard_payloads_parse_back() {
    let keyboard = create_model_keyboard();

    for button in keyboard.inline_keyboard.iter().flatten() {
        let data = callback_data(button);
        let key = data
            .strip_prefix(MODEL_CALLBACK_PREFIX)
            .unwrap_or_else(|| panic!("payload {data} missing model prefix"));
        assert!(is_known_model(key), "payload {data} names an unknown model");
    }
}

/// Every quiz answer button must parse back into an epoch.
#[test]
fn test_quiz_keyboard_payloads_parse_back() {
    let keyboard = create_quiz_answer_keyboard();

    let answer_buttons: Vec<&InlineKeyboardButton> = keyboard
        .inline_keyboard
        .iter()
        .flatten()
        .filter(|b| callback_data(b).starts_with(QUIZ_ANSWER_PREFIX))
        .collect();

    assert_eq!(answer_buttons.len(), Epoch::ALL.len());

    for button in answer_buttons {
        let key = callback_data(button)
            .strip_prefix(QUIZ_ANSWER_PREFIX)
            .unwrap();
        assert!(Epoch::from_key(key).is_some());
    }
}

/// The answer-checking branches of the quiz, driven through the session
/// store: answering with the posed epoch yields the correct branch,
/// every other epoch yields the incorrect branch naming the posed
/// epoch's label.
#[test]
fn test_quiz_answer_branches() {
    let sessions = QuizSessions::default();
    sessions.pose(12345, Epoch::Tsardom);

    let posed = sessions.posed(12345).expect("question was just posed");

    for candidate in Epoch::ALL {
        let feedback = format_quiz_feedback(candidate, posed);
        if candidate == posed {
            assert!(feedback.starts_with("Correct!"));
        } else {
            assert!(!feedback.starts_with("Correct!"));
            assert!(feedback.contains(posed.label()));
            assert!(!feedback.contains(candidate.label()));
        }
    }
}

/// A stale double-tap re-checks against the same epoch: answering does
/// not consume the posed question until the next one overwrites it.
#[test]
fn test_quiz_answer_is_idempotent() {
    let sessions = QuizSessions::default();
    sessions.pose(12345, Epoch::Bloomery);

    assert_eq!(sessions.posed(12345), Some(Epoch::Bloomery));
    assert_eq!(sessions.posed(12345), Some(Epoch::Bloomery));

    sessions.pose(12345, Epoch::Imperial);
    assert_eq!(sessions.posed(12345), Some(Epoch::Imperial));
}

/// Two users running full quiz cycles concurrently never see each
/// other's posed question.
#[tokio::test]
async fn test_concurrent_quiz_cycles_stay_isolated() {
    let sessions = std::sync::Arc::new(QuizSessions::default());

    let a = {
        let sessions = std::sync::Arc::clone(&sessions);
        tokio::spawn(async move {
            for _ in 0..50 {
                sessions.pose(111, Epoch::Muscovite);
                assert_eq!(sessions.posed(111), Some(Epoch::Muscovite));
                tokio::task::yield_now().await;
            }
        })
    };
    let b = {
        let sessions = std::sync::Arc::clone(&sessions);
        tokio::spawn(async move {
            for _ in 0..50 {
                sessions.pose(222, Epoch::Imperial);
                assert_eq!(sessions.posed(222), Some(Epoch::Imperial));
                tokio::task::yield_now().await;
            }
        })
    };

    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(sessions.posed(111), Some(Epoch::Muscovite));
    assert_eq!(sessions.posed(222), Some(Epoch::Imperial));
}

/// Error display strings distinguish the failure reasons handlers and
/// logs rely on.
#[test]
fn test_generation_error_formatting() {
    assert_eq!(
        format!("{}", GenerationError::Timeout),
        "Generation request timed out"
    );
    assert!(format!("{}", GenerationError::Network("refused".to_string()))
        .contains("refused"));
    assert!(format!("{}", GenerationError::Parse("bad json".to_string()))
        .contains("bad json"));
}
