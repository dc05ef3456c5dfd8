//! Protocol scenarios exercised through the public API only.

use cable_client::codec::{self, Command, WireMessage};
use cable_client::{dispatch, Cable, CableError, CableEvent, Identifier, SubscriptionState};
use serde_json::json;

const WELCOME: &str = r#"{"type":"welcome"}"#;
const CONFIRM_GENERAL: &str = r#"{"type":"confirm_subscription","identifier":"{\"channel\":\"ChatChannel\",\"room\":\"general\"}"}"#;
const REJECT_GENERAL: &str = r#"{"type":"reject_subscription","identifier":"{\"channel\":\"ChatChannel\",\"room\":\"general\"}"}"#;
const PUSH_GENERAL: &str = r#"{"identifier":"{\"channel\":\"ChatChannel\",\"room\":\"general\"}","message":{"text":"hi"}}"#;

fn general() -> Identifier {
    Identifier::new("ChatChannel", [("room", "general")])
}

fn connected() -> Cable {
    dispatch(&Cable::new("ws://localhost:3000/cable"), WELCOME).0
}

#[test]
fn test_decode_confirm_scenario() {
    assert_eq!(codec::decode(CONFIRM_GENERAL), WireMessage::Confirm(general()));
}

#[test]
fn test_decode_data_scenario() {
    assert_eq!(
        codec::decode(PUSH_GENERAL),
        WireMessage::ReceiveData(general(), json!({"text": "hi"}))
    );
}

#[test]
fn test_decode_never_panics_on_garbage() {
    for frame in ["not json", "", "null", "[]", r#"{"type":42}"#, "\u{0}"] {
        assert!(matches!(codec::decode(frame), WireMessage::Error(_)), "{frame:?}");
    }
}

#[test]
fn test_subscribe_on_disconnected_cable_always_fails() {
    let cable = Cable::new("ws://localhost:3000/cable");
    for id in [general(), Identifier::named(""), Identifier::new("X", [("a", "b")])] {
        assert_eq!(cable.subscribe_to(&id), Err(CableError::Disconnected));
    }
}

#[test]
fn test_full_lifecycle() {
    let step = connected().subscribe_to(&general()).unwrap();
    assert_eq!(
        Command::decode(step.frame.as_deref().unwrap()).unwrap(),
        Command::Subscribe(general())
    );
    assert_eq!(
        step.cable.subscribe_to(&general()),
        Err(CableError::AlreadyTryingToSubscribe(general()))
    );

    // Performing before confirmation is allowed.
    let data = vec![("text".to_string(), json!("early"))];
    assert!(step.cable.perform("speak", &data, &general()).is_ok());

    let (cable, event) = dispatch(&step.cable, CONFIRM_GENERAL);
    assert_eq!(event, CableEvent::Confirmed(general()));
    assert_eq!(cable.subscription(&general()), Some(SubscriptionState::Subscribed));

    let (cable, event) = dispatch(&cable, PUSH_GENERAL);
    assert_eq!(
        event,
        CableEvent::Received {
            identifier: general(),
            message: json!({"text": "hi"}),
        }
    );

    let step = cable.unsubscribe_from(&general()).unwrap();
    assert_eq!(
        step.cable.subscription(&general()),
        Some(SubscriptionState::Unsubscribed)
    );
    assert_eq!(
        step.cable.perform("speak", &data, &general()),
        Err(CableError::ChannelNotSubscribed(general()))
    );

    let resubscribed = step.cable.subscribe_to(&general()).unwrap();
    assert_eq!(
        resubscribed.cable.subscription(&general()),
        Some(SubscriptionState::Attempted)
    );
}

#[test]
fn test_rejection_then_drop() {
    let cable = connected().subscribe_to(&general()).unwrap().cable;
    let (cable, event) = dispatch(&cable, REJECT_GENERAL);
    assert_eq!(event, CableEvent::Rejected(general()));
    assert_eq!(cable.subscription(&general()), Some(SubscriptionState::Rejected));

    let dropped = cable.drop_subscription(&general());
    assert_eq!(dropped.frame, None);
    assert_eq!(dropped.cable.subscription(&general()), None);

    let again = dropped.cable.drop_subscription(&general());
    assert_eq!(again.cable, dropped.cable);
    assert_eq!(again.frame, None);
}

#[test]
fn test_parameter_order_distinguishes_subscriptions() {
    let ab = Identifier::new("C", [("a", "1"), ("b", "2")]);
    let ba = Identifier::new("C", [("b", "2"), ("a", "1")]);

    let cable = connected().subscribe_to(&ab).unwrap().cable;
    assert!(cable.subscribe_to(&ba).is_ok());
    assert_eq!(
        cable.subscribe_to(&ab.canonical()),
        Err(CableError::AlreadyTryingToSubscribe(ab.clone()))
    );
}

#[test]
fn test_confirm_for_reordered_identifier_does_not_match() {
    let ab = Identifier::new("C", [("a", "1"), ("b", "2")]);
    let cable = connected().subscribe_to(&ab).unwrap().cable;

    let reordered = r#"{"type":"confirm_subscription","identifier":"{\"channel\":\"C\",\"b\":\"2\",\"a\":\"1\"}"}"#;
    let (cable, _) = dispatch(&cable, reordered);
    assert_eq!(cable.subscription(&ab), Some(SubscriptionState::Attempted));
}

#[test]
fn test_identifier_round_trip_through_frames() {
    let id = Identifier::new("Weird\"Channel", [("emoji", "🚀"), ("json", "{\"a\":[1]}")]);
    let frame = codec::subscribe_command(&id);
    assert_eq!(Command::decode(&frame).unwrap().identifier(), &id);

    let confirm = json!({
        "type": "confirm_subscription",
        "identifier": id.to_json_string(),
    })
    .to_string();
    assert_eq!(codec::decode(&confirm), WireMessage::Confirm(id));
}
