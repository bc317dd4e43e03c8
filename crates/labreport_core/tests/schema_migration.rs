use labreport_core::persistence::Envelope;
use labreport_core::schema::{latest_version, migrate, RawEnvelope, SchemaError};
use serde_json::json;

fn v1_fixture() -> RawEnvelope {
    RawEnvelope::from_value(json!({
        "title": "Pendulum",
        "author": "Lin",
        "cells": [
            { "id": "c1", "type": "text", "content": "period" },
            { "id": "c2", "type": "code", "content": "2 * pi * sqrt(l / g)" }
        ]
    }))
    .unwrap()
}

#[test]
fn migration_is_idempotent() {
    let once = migrate(v1_fixture()).unwrap();
    let twice = migrate(once.clone()).unwrap();

    assert_eq!(once.version(), Ok(latest_version()));
    assert_eq!(twice, once);
}

#[test]
fn migrated_v1_parses_as_current_envelope() {
    let envelope: Envelope = serde_json::from_value(migrate(v1_fixture()).unwrap().into_value())
        .unwrap();

    assert_eq!(envelope.version, latest_version());
    assert_eq!(envelope.timestamp, 0);
    assert_eq!(envelope.title, "Pendulum");

    let (document, failures) = envelope.into_document();
    assert!(failures.is_empty());
    document.validate().unwrap();
    let ids: Vec<&str> = document.cells().map(|cell| cell.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert_eq!(document.sections[0].title, "Section 1");
    assert_eq!(document.sections[0].subsections[0].title, "Subsection 1");
}

#[test]
fn empty_v1_store_migrates_to_one_empty_subsection() {
    let migrated = migrate(RawEnvelope::from_value(json!({ "title": "Blank" })).unwrap())
        .unwrap()
        .into_value();

    let cells = migrated["sections"][0]["subsections"][0]["cells"]
        .as_array()
        .unwrap();
    assert!(cells.is_empty());
}

#[test]
fn non_object_envelope_is_malformed() {
    assert!(matches!(
        RawEnvelope::from_value(json!([1, 2, 3])),
        Err(SchemaError::MalformedEnvelope(_))
    ));
}
