//! End-to-end scenarios across the engine: parse, build, validate,
//! route, frame, and decision support.

use std::sync::Arc;

use bytes::BytesMut;
use hale::cds::{register_builtin, CdsEngine, CdsRequest, Indicator};
use hale::mllp::{MllpClient, MllpClientConfig, MllpCodec, MllpServer, MllpServerConfig};
use hale::router::{HandlerResult, MessageRouter, MllpRouterBridge};
use hale::validator::Validator;
use hale::{MessageBuilder, MshConfig};
use hale_core::builder::segments::{EventInput, PatientInput, VisitInput};
use serde_json::json;
use tokio_util::codec::Decoder;

const ADT_A01: &str = "MSH|^~\\&|TRIBAL|FACILITY|DEST|FAC|20240115120000||ADT^A01|MSG001|P|2.5.1\rEVN|A01|20240115120000\rPID|1||MRN001^^^TRIBAL^MR||DOE^JOHN^M||19800515|M\rPV1|1|I|ICU^101^A";

#[test]
fn parse_adt_and_extract_patient_name() {
    let message = hale::parser::parse(ADT_A01).unwrap();

    assert_eq!(message.segment_count(), 4);
    assert_eq!(message.header.message_type, "ADT^A01");

    let pid = message.find_segment("PID").unwrap();
    assert_eq!(pid.component_value(5, 1), "DOE");

    let pv1 = message.find_segment("PV1").unwrap();
    assert_eq!(pv1.component_value(3, 2), "101");
}

#[test]
fn builder_round_trip() {
    let mut builder = MessageBuilder::new();
    builder.create_message("ADT", "A01");
    builder.add_msh(MshConfig {
        receiving_application: "DOWNSTREAM".to_string(),
        ..Default::default()
    });
    builder.add_evn(&EventInput {
        event_type_code: "A01".to_string(),
        ..Default::default()
    });
    builder.add_pid(&PatientInput {
        id: "MRN-RT-001".to_string(),
        family_name: "ROUNDTRIP".to_string(),
        given_name: "TEST".to_string(),
        date_of_birth: "19900101".to_string(),
        sex: "F".to_string(),
        ..Default::default()
    });
    builder.add_pv1(&VisitInput {
        patient_class: "O".to_string(),
        ..Default::default()
    });

    let message = hale::parser::parse(&builder.build()).unwrap();
    let pid = message.find_segment("PID").unwrap();
    assert!(pid.field_value(3).contains("MRN-RT-001"));
    assert_eq!(pid.component_value(5, 1), "ROUNDTRIP");
    assert_eq!(pid.field_value(8), "F");
    assert_eq!(message.find_segment("PV1").unwrap().field_value(2), "O");

    // Builder output validates cleanly
    assert!(Validator::new().validate(&message).is_valid());
}

#[test]
fn parse_build_parse_is_stable() {
    let first = hale::parser::parse(ADT_A01).unwrap();
    let second = hale::parser::parse(&first.encode()).unwrap();
    assert_eq!(first.segments, second.segments);
    assert_eq!(first.header, second.header);
}

#[test]
fn validator_rejects_missing_pid() {
    let raw = "MSH|^~\\&|TRIBAL|FACILITY|DEST|FAC|20240115120000||ADT^A01|MSG002|P|2.5.1\rEVN|A01\rPV1|1|I";
    let message = hale::parser::parse(raw).unwrap();

    let result = Validator::new().validate(&message);
    assert!(!result.is_valid());

    let errors = result.errors_only();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, "MISSING_REQUIRED_SEGMENT");
    assert_eq!(errors[0].segment, "PID");
}

#[tokio::test]
async fn router_dispatches_and_acks() {
    let router = MessageRouter::new();
    router.register("ADT", "A01", |_message| async move {
        Ok(HandlerResult::accept())
    });

    let message = hale::parser::parse(ADT_A01).unwrap();
    let ack = router.route(&message).await.unwrap();

    assert!(ack.header.message_type.starts_with("ACK"));
    let msa = ack.find_segment("MSA").unwrap();
    assert_eq!(msa.field_value(1), "AA");
    assert_eq!(msa.field_value(2), "MSG001");

    // ACK addressing mirrors the original
    let msh = ack.find_segment("MSH").unwrap();
    assert_eq!(msh.field_value(3), "DEST");
    assert_eq!(msh.field_value(4), "FAC");
    assert_eq!(msh.field_value(5), "TRIBAL");
    assert_eq!(msh.field_value(6), "FACILITY");
}

#[test]
fn mllp_decoder_reassembles_split_frames() {
    let payload = "MSH|^~\\&|A|B|C|D|20240101000000||ADT^A01|1|P|2.5.1";
    let thirds = [
        &payload[..10],
        &payload[10..29],
        &payload[29..],
    ];

    let mut codec = MllpCodec::default();
    let mut decoded = Vec::new();
    let feed = |bytes: &[u8], codec: &mut MllpCodec, decoded: &mut Vec<String>| {
        let mut buf = BytesMut::from(bytes);
        while let Ok(Some(frame)) = codec.decode(&mut buf) {
            decoded.push(frame.unwrap());
        }
    };

    feed(b"GARBAGE", &mut codec, &mut decoded);
    feed(&[0x0B], &mut codec, &mut decoded);
    for chunk in thirds {
        feed(chunk.as_bytes(), &mut codec, &mut decoded);
    }
    feed(&[0x1C], &mut codec, &mut decoded);
    feed(&[0x0D], &mut codec, &mut decoded);

    assert_eq!(decoded, vec![payload.to_string()]);
}

#[tokio::test]
async fn inbound_flow_over_mllp() {
    // bytes -> frame -> parse -> route -> ACK -> frame -> bytes, all over
    // a real socket pair
    let router = Arc::new(MessageRouter::new());
    router.register("ADT", "*", |_message| async move {
        Ok(HandlerResult::accept())
    });

    let server = MllpServer::start(
        MllpServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        },
        Arc::new(MllpRouterBridge::new(router.clone())),
    )
    .await
    .unwrap();

    let mut client = MllpClient::new(MllpClientConfig {
        host: "127.0.0.1".to_string(),
        port: server.local_addr().port(),
        ..Default::default()
    });

    let ack = client.send(ADT_A01).await.unwrap();
    assert_eq!(ack.find_segment("MSA").unwrap().field_value(1), "AA");
    assert_eq!(ack.find_segment("MSA").unwrap().field_value(2), "MSG001");

    // An unroutable message is rejected and dead-lettered
    let oru = ADT_A01.replace("ADT^A01", "ORU^R01").replace("MSG001", "MSG002");
    let ack = client.send(&oru).await.unwrap();
    assert_eq!(ack.find_segment("MSA").unwrap().field_value(1), "AR");
    assert_eq!(router.dead_letters().len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn drug_interaction_card_for_warfarin_ibuprofen() {
    let engine = CdsEngine::new();
    register_builtin(&engine);

    let request: CdsRequest = serde_json::from_value(json!({
        "hookInstance": "6a511f1e-0000-4000-8000-00000000cds1",
        "hook": "order-select",
        "context": {
            "patientId": "patient-1",
            "draftOrders": [{"text": "Ibuprofen 400mg"}]
        },
        "prefetch": {
            "activeMedications": [{"text": "Warfarin 5mg"}]
        }
    }))
    .unwrap();

    let response = engine.invoke_hook(&request).await;

    let card = response
        .cards
        .iter()
        .find(|c| c.indicator == Indicator::Critical)
        .expect("expected a critical interaction card");

    let summary = card.summary.to_lowercase();
    assert!(summary.contains("warfarin"));
    assert!(summary.contains("bleeding"));
    assert!(!card.uuid.is_empty());

    let suggestions = card.suggestions.as_ref().unwrap();
    assert!(suggestions.iter().any(|s| s.label.contains("Cancel")));
    assert!(!card.override_reasons.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn cds_discovery_lists_all_hooks() {
    let engine = CdsEngine::new();
    register_builtin(&engine);

    let discovery = engine.discovery();
    let hooks: Vec<&str> = discovery.iter().map(|d| d.hook.as_str()).collect();
    for hook in ["patient-view", "order-select", "order-sign", "medication-prescribe"] {
        assert!(hooks.contains(&hook), "missing hook {}", hook);
    }
}
