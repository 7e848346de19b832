use bytes::Bytes;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use wsgat::common::test_utils::{RecordingPresenter, Rendered, channel_lines, memory_transport};
use wsgat::console::{normalize_line, run_session};
use wsgat::websocket::parse_header;
use wsgat::{Mode, SessionEnd, Style};

#[derive(Debug, Clone)]
enum Event {
    Inbound(String),
    Outbound(String),
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-z0-9 ]{0,16}".prop_map(Event::Inbound),
        "[a-z0-9 ]{0,16}".prop_map(Event::Outbound),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: every inbound message is shown once, in order, on a cleared
    /// line, and every operator line is sent once, in order
    #[test]
    fn session_preserves_both_directions(events in prop::collection::vec(event(), 0..24)) {
        tokio_test::block_on(async {
            let (source, sink, mut peer) = memory_transport();
            let (lines, feeder) = channel_lines();
            let presenter = RecordingPresenter::new();

            let session = tokio::spawn(run_session(
                source,
                sink,
                Arc::new(Mutex::new(lines)),
                presenter.clone(),
                Mode::Listening,
                CancellationToken::new(),
            ));

            let mut inbound = Vec::new();
            let mut outbound = Vec::new();
            for event in &events {
                match event {
                    Event::Inbound(text) => {
                        peer.deliver(text.clone());
                        inbound.push(format!("< {text}\n"));
                    }
                    Event::Outbound(text) => {
                        feeder.type_line(&format!("{text}\n"));
                        outbound.push(Bytes::from(text.clone()));
                    }
                }
            }

            prop_assert!(peer.wait_for_sent(outbound.len(), Duration::from_secs(5)).await);
            peer.hang_up();
            let end = session.await.unwrap();

            prop_assert!(matches!(end, SessionEnd::PeerClosed));
            prop_assert_eq!(peer.sent(), outbound);
            prop_assert_eq!(presenter.texts(Style::Inbound), inbound);

            let rendered = presenter.rendered();
            for (at, r) in rendered.iter().enumerate() {
                if matches!(r, Rendered::Text(_, Style::Inbound)) {
                    prop_assert_eq!(&rendered[at - 1], &Rendered::Clear);
                }
            }
            prop_assert_eq!(presenter.count("disconnected"), 1);
            Ok(())
        })?;
    }

    /// Property: a header splits at its first colon
    #[test]
    fn header_splits_at_first_colon(
        name in "[A-Za-z][A-Za-z0-9-]{0,15}",
        value in "[A-Za-z0-9:/.=-]{0,24}",
    ) {
        let (parsed_name, parsed_value) = parse_header(&format!("{name}:{value}")).unwrap();
        prop_assert_eq!(parsed_name.as_str(), name.to_ascii_lowercase());
        prop_assert_eq!(parsed_value.to_str().unwrap(), value);
    }

    /// Property: entries without a colon are always rejected
    #[test]
    fn header_without_colon_is_rejected(raw in "[^:]{0,32}") {
        prop_assert!(parse_header(&raw).is_err());
    }

    /// Property: normalizing removes only trailing line endings
    #[test]
    fn normalize_only_touches_line_endings(
        body in "[^\r\n]{0,32}",
        ending in "[\r\n]{0,4}",
    ) {
        let line = format!("{body}{ending}");
        prop_assert_eq!(normalize_line(&line), body.as_str());
    }
}
