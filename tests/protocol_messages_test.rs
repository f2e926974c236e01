/// Integration tests for the wire event types
///
/// Validates serialization of outbound events and parsing of inbound events
/// for the realtime conversation protocol.
use voxline::protocol::messages::*;

#[test]
fn test_outbound_event_wire_format() {
    println!("\n=== Outbound Event Wire Format ===");

    let append = ClientEvent::InputAudioBufferAppend {
        audio: "UENNMTY=".to_string(),
    };
    let json = serde_json::to_string(&append).unwrap();
    println!("append: {}", json);
    assert!(json.contains("\"type\":\"input_audio_buffer.append\""));
    assert!(json.contains("\"audio\":\"UENNMTY=\""));

    let commit = serde_json::to_string(&ClientEvent::InputAudioBufferCommit).unwrap();
    println!("commit: {}", commit);
    assert_eq!(commit, "{\"type\":\"input_audio_buffer.commit\"}");

    let create = serde_json::to_string(&ClientEvent::ResponseCreate { response: None }).unwrap();
    println!("response.create: {}", create);
    assert_eq!(create, "{\"type\":\"response.create\"}");

    println!("✓ Outbound discriminators correct");
}

#[test]
fn test_session_update_full_configuration() {
    println!("\n=== session.update Configuration ===");

    let event = ClientEvent::SessionUpdate {
        session: SessionConfig {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: Some("You are a helpful assistant.".to_string()),
            voice: "alloy".to_string(),
            input_audio_format: "pcm16".to_string(),
            output_audio_format: "pcm16".to_string(),
            input_audio_transcription: Some(TranscriptionConfig {
                model: "whisper-1".to_string(),
            }),
            turn_detection: Some(TurnDetection::default()),
        },
    };

    let json = serde_json::to_string_pretty(&event).unwrap();
    println!("{}", json);

    assert!(json.contains("session.update"));
    assert!(json.contains("pcm16"));
    assert!(json.contains("server_vad"));
    assert!(json.contains("whisper-1"));
    assert!(json.contains("helpful assistant"));

    println!("✓ Session configuration serializes with PCM16 both directions");
}

#[test]
fn test_user_text_item() {
    let event = ClientEvent::ConversationItemCreate {
        item: ConversationItem::user_text("ping"),
    };

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"conversation.item.create\""));
    assert!(json.contains("\"type\":\"message\""));
    assert!(json.contains("\"role\":\"user\""));
    assert!(json.contains("\"type\":\"input_text\""));
    assert!(json.contains("\"text\":\"ping\""));
}

#[test]
fn test_inbound_streaming_sequence() {
    println!("\n=== Inbound Streaming Sequence ===");

    let sequence = [
        r#"{"type":"session.created","session":{"id":"sess_A"}}"#,
        r#"{"type":"response.created","response":{"id":"resp_1"}}"#,
        r#"{"type":"response.text.delta","delta":"Hi"}"#,
        r#"{"type":"response.audio.delta","delta":"AAAA"}"#,
        r#"{"type":"response.text.done","text":"Hi"}"#,
        r#"{"type":"response.audio.done"}"#,
        r#"{"type":"response.done","response":{"status":"completed"}}"#,
    ];

    let expected_types = [
        "session.created",
        "response.created",
        "response.text.delta",
        "response.audio.delta",
        "response.text.done",
        "response.audio.done",
        "response.done",
    ];

    for (json, expected) in sequence.iter().zip(expected_types) {
        let event = parse_server_event(json).unwrap();
        println!("parsed: {}", event.event_type());
        assert_eq!(event.event_type(), expected);
    }

    println!("✓ Full streaming sequence parses");
}

#[test]
fn test_quota_failure_detection() {
    println!("\n=== Quota Failure Detection ===");

    let json = r#"{
        "type": "response.done",
        "response": {
            "status": "failed",
            "status_details": {
                "type": "failed",
                "error": {
                    "type": "insufficient_quota",
                    "message": "You exceeded your current quota, please check your plan and billing details.",
                    "code": "insufficient_quota"
                }
            }
        }
    }"#;

    let event = parse_server_event(json).unwrap();
    let ServerEvent::ResponseDone { response } = event else {
        panic!("Expected ResponseDone");
    };

    assert!(response.is_failed());
    assert!(response.is_quota_exceeded());
    assert_eq!(response.error_type(), Some("insufficient_quota"));

    println!("✓ insufficient_quota detected in status_details");
}

#[test]
fn test_generic_failure_is_not_quota() {
    let json = r#"{
        "type": "response.done",
        "response": {
            "status": "failed",
            "status_details": {"error": {"type": "server_error", "message": "oops"}}
        }
    }"#;

    let event = parse_server_event(json).unwrap();
    let ServerEvent::ResponseDone { response } = event else {
        panic!("Expected ResponseDone");
    };

    assert!(response.is_failed());
    assert!(!response.is_quota_exceeded());
}

#[test]
fn test_unknown_event_types_are_forwarded_not_dropped() {
    println!("\n=== Unknown Event Forwarding ===");

    for json in [
        r#"{"type":"rate_limits.updated","rate_limits":[{"name":"requests"}]}"#,
        r#"{"type":"response.output_item.added","item":{}}"#,
        r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":"hi"}"#,
    ] {
        let event = parse_server_event(json).unwrap();
        match &event {
            ServerEvent::Other { event_type } => {
                println!("forwarded as other: {}", event_type);
                assert!(!event_type.is_empty());
            }
            other => panic!("Expected Other, got {:?}", other),
        }
    }

    println!("✓ Unknown discriminators become ServerEvent::Other");
}

#[test]
fn test_malformed_known_event_is_rejected() {
    // Known discriminator, wrong payload shape
    assert!(parse_server_event(r#"{"type":"response.text.delta","delta":[1,2]}"#).is_err());
    assert!(parse_server_event(r#"{"type":"session.created","session":"nope"}"#).is_err());

    // Not an event object at all
    assert!(parse_server_event(r#"[1,2,3]"#).is_err());
    assert!(parse_server_event(r#"{"no_type":true}"#).is_err());
}

#[test]
fn test_error_event_payload() {
    let json = r#"{
        "type": "error",
        "error": {
            "type": "invalid_request_error",
            "message": "The session is in an invalid state.",
            "code": "session_invalid"
        }
    }"#;

    let event = parse_server_event(json).unwrap();
    let ServerEvent::Error { error } = event else {
        panic!("Expected Error event");
    };

    assert_eq!(error.error_type, "invalid_request_error");
    assert!(error.message.contains("invalid state"));
    assert_eq!(error.code.as_deref(), Some("session_invalid"));
}
