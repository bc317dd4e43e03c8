use labreport_core::{
    normalize_document, normalize_sections, parse_template_response, CellType, ImageMode,
    StructureError,
};
use serde_json::json;

#[test]
fn empty_section_list_is_rejected() {
    assert_eq!(
        normalize_sections(&json!({ "sections": [] })).unwrap_err(),
        StructureError::EmptySections
    );
    assert_eq!(
        normalize_sections(&json!([])).unwrap_err(),
        StructureError::EmptySections
    );
}

#[test]
fn title_only_section_gets_id_and_no_subsections() {
    let sections = normalize_sections(&json!({ "sections": [{ "title": "X" }] })).unwrap();

    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].title, "X");
    assert!(!sections[0].id.is_empty());
    assert!(sections[0].subsections.is_empty());
}

#[test]
fn non_structural_values_are_rejected() {
    for value in [json!(null), json!("sections"), json!(42), json!({ "title": "X" })] {
        assert!(
            matches!(
                normalize_sections(&value),
                Err(StructureError::UnsupportedShape(_))
            ),
            "accepted {value}"
        );
    }
}

#[test]
fn nested_shape_errors_carry_the_node_path() {
    let err = normalize_sections(&json!([
        { "title": "ok" },
        { "subsections": [{ "cells": "not a list" }] }
    ]))
    .unwrap_err();

    match err {
        StructureError::InvalidNode { path, .. } => assert_eq!(path, "sections[1].subsections[0]"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_cell_type_is_rejected_not_guessed() {
    let err = normalize_sections(&json!([{
        "subsections": [{ "cells": [{ "type": "video" }] }]
    }]))
    .unwrap_err();

    assert_eq!(
        err,
        StructureError::UnknownCellType {
            path: "sections[0].subsections[0].cells[0]".to_string(),
            value: "video".to_string(),
        }
    );
}

#[test]
fn normalized_document_always_validates() {
    let document = normalize_document(
        &json!([
            { "id": "a", "subsections": [
                { "id": 7, "cells": [{ "id": "c" }, { "id": "c", "type": "IMAGE", "mode": "drone" }] },
                { "id": "7" }
            ]},
            { "id": "a" }
        ]),
        "Imported",
        "Someone",
    )
    .unwrap();

    document.validate().unwrap();
    assert_eq!(document.title, "Imported");
    assert_ne!(document.sections[0].id, document.sections[1].id);

    let subsections = &document.sections[0].subsections;
    assert_eq!(subsections[0].id, "7");
    assert_ne!(subsections[1].id, "7");

    let cells = &subsections[0].cells;
    assert_eq!(cells[0].id, "c");
    assert_ne!(cells[1].id, "c");
    assert_eq!(cells[1].cell_type(), CellType::Image);
    assert_eq!(cells[1].mode(), Some(ImageMode::Placeholder));
}

#[test]
fn template_response_structure_goes_through_normalization() {
    let err = parse_template_response(&json!({
        "success": true,
        "name": "Empty",
        "structure": { "sections": [] }
    }))
    .unwrap_err();
    assert_eq!(err, StructureError::EmptySections);

    let imported = parse_template_response(&json!({
        "success": true,
        "name": "Optics",
        "structure": [{ "title": "Lenses", "subsections": [{ "cells": [{ "content": 1.5 }] }] }]
    }))
    .unwrap();
    assert_eq!(imported.name, "Optics");
    assert_eq!(imported.sections[0].subsections[0].cells[0].content, "1.5");
}
