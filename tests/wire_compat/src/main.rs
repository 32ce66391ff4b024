fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use mission_protocol::constants::HEARTBEAT;
    use mission_protocol::{ControlFrame, ControlKind, Frame, TransferMeta};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture as raw text, the way it arrives in a text frame.
    fn load_text(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
            .trim_end()
            .to_string()
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_text(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Parses a fixture as a control frame, re-serializes it and compares
    /// the JSON values (key order independent).
    fn roundtrip_test(name: &str) -> ControlFrame {
        let fixture = load_fixture(name);
        let parsed: ControlFrame = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  legacy: {fixture}\n  Rust:   {reserialized}"
        );
        parsed
    }

    fn control(name: &str) -> ControlFrame {
        match Frame::from_text(&load_text(name)) {
            Ok(Frame::Control(c)) => c,
            other => panic!("{name} should decode as a control frame, got {other:?}"),
        }
    }

    #[test]
    fn fixture_begin_upload() {
        let frame = roundtrip_test("begin_upload.json");
        assert_eq!(frame.kind, ControlKind::BeginUpload);

        let meta = frame.meta();
        assert_eq!(meta.filename, "Operation_Nightfall.miz");
        assert_eq!(meta.size, 3);
        assert_eq!(
            meta.expected_digest().as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn fixture_begin_upload_unknown_size() {
        let frame = roundtrip_test("begin_upload_unknown_size.json");
        let meta = frame.meta();
        assert_eq!(meta.size, -1);
        assert!(meta.sha256.is_none());
    }

    #[test]
    fn fixture_end_upload() {
        let frame = roundtrip_test("end_upload.json");
        assert_eq!(frame, ControlFrame::end("1718030450123456789"));
    }

    #[test]
    fn end_upload_serializes_byte_identical() {
        let ours = ControlFrame::end("1718030450123456789").to_json().unwrap();
        assert_eq!(ours, load_text("end_upload.json"));
    }

    #[test]
    fn begin_upload_from_meta_matches_fixture() {
        let meta = TransferMeta {
            id: "1718030450123456789".into(),
            filename: "Operation_Nightfall.miz".into(),
            size: 3,
            sha256: Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".into()),
        };
        let ours = serde_json::to_value(ControlFrame::begin(&meta)).unwrap();
        assert_eq!(ours, load_fixture("begin_upload.json"));
    }

    #[test]
    fn fixtures_decode_as_text_frames() {
        assert_eq!(control("begin_upload.json").kind, ControlKind::BeginUpload);
        assert_eq!(control("end_upload.json").kind, ControlKind::EndUpload);
    }

    #[test]
    fn fixture_unknown_type_is_tolerated() {
        let frame = control("unknown_type.json");
        assert_eq!(frame.kind, ControlKind::Unknown);
        assert_eq!(frame.id, "1718030450123456789");
    }

    #[test]
    fn heartbeat_is_plain_text() {
        assert_eq!(HEARTBEAT, "ping");
        assert_eq!(Frame::from_text("ping").unwrap(), Frame::Heartbeat);
    }
}
