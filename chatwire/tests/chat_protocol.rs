//! Integration tests for the chat client over the in-memory transport

use chatwire::models::{
    ChatNotif, ConnectNotif, PublicTopicInfo, QueryChatRequest, QueryTopicRequest,
};
use chatwire::{ChatClient, ChatConfig, ConnectionConfig, ConnectionState, Error};
use chatwire_test_support::{FakeServer, Fragmenter};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

fn config() -> ChatConfig {
    ChatConfig::new("ws://fake/chat/").with_connection(ConnectionConfig::default().with_jitter(0.0))
}

fn connected(config: ChatConfig) -> (ChatClient, FakeServer) {
    let server = FakeServer::new();
    let mut chat = ChatClient::new(config, server.factory());
    chat.connect();
    server.accept();
    chat.tick(Duration::ZERO);
    assert!(chat.is_connected());
    (chat, server)
}

fn respond(server: &FakeServer, id: &str, result: Value) {
    server.deliver_enveloped(&json!({"jsonrpc": "2.0", "id": id, "result": result}));
}

fn notify(server: &FakeServer, method: &str, params: Value) {
    server.deliver_enveloped(&json!({"jsonrpc": "2.0", "method": method, "params": params}));
}

fn counter() -> (Rc<RefCell<usize>>, Rc<RefCell<usize>>) {
    let c = Rc::new(RefCell::new(0));
    (c.clone(), c)
}

/// Test the connected notice stores the session id and reaches its handler
#[test]
fn test_session_id_from_connected_notice() {
    let (mut chat, server) = connected(config());
    let seen: Rc<RefCell<Option<ConnectNotif>>> = Rc::new(RefCell::new(None));
    let s = seen.clone();
    chat.on_session_connected(move |n| *s.borrow_mut() = Some(n));

    notify(&server, "eventConnected", json!({"connectionId": "conn-42"}));
    chat.tick(Duration::ZERO);

    assert_eq!(chat.session_id(), Some("conn-42"));
    assert_eq!(seen.borrow().as_ref().map(|n| n.connection_id.as_str()), Some("conn-42"));
}

/// Test outbound request shape
#[test]
fn test_request_wire_shape() {
    let (mut chat, server) = connected(config());
    let id = chat.send_chat("topic-1", "hi", |_| {}, |_| {}).unwrap();

    let request = server.last_request().unwrap();
    assert_eq!(request["jsonrpc"], "2.0");
    assert_eq!(request["method"], "sendChat");
    assert_eq!(request["params"], json!({"topicId": "topic-1", "message": "hi"}));
    assert_eq!(request["id"], id.as_str());
    assert!(chat.is_pending(&id));
}

/// Test N requests answered in reverse order each fire their own continuation
#[test]
fn test_reverse_order_responses() {
    let (mut chat, server) = connected(config());
    let log = Rc::new(RefCell::new(Vec::new()));

    let ids: Vec<String> = (0..5)
        .map(|i| {
            let log = log.clone();
            let request = QueryChatRequest {
                topic_id: format!("topic-{}", i),
                limit: 10,
                ..Default::default()
            };
            chat.query_chat(
                &request,
                move |resp| log.borrow_mut().push((i, resp.data[0].chat_id.clone())),
                |e| panic!("unexpected error: {}", e),
            )
            .unwrap()
        })
        .collect();
    assert_eq!(chat.pending_requests(), 5);

    for (i, id) in ids.iter().enumerate().rev() {
        respond(&server, id, json!({"data": [{"chatId": format!("chat-{}", i)}]}));
    }
    chat.tick(Duration::ZERO);

    let expected: Vec<(usize, String)> = (0..5).rev().map(|i| (i, format!("chat-{}", i))).collect();
    assert_eq!(*log.borrow(), expected);
    assert_eq!(chat.pending_requests(), 0);
}

/// Test a server error object reaches the error continuation
#[test]
fn test_server_error_response() {
    let (mut chat, server) = connected(config());
    let code = Rc::new(RefCell::new(None));
    let c = code.clone();
    let id = chat
        .block_user(
            "user-7",
            |_| panic!("should fail"),
            move |e| *c.borrow_mut() = e.code(),
        )
        .unwrap();

    server.deliver_enveloped(&json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": 11001, "message": "not allowed"}
    }));
    chat.tick(Duration::ZERO);

    assert_eq!(*code.borrow(), Some(11001));
    assert!(!chat.is_pending(&id));
}

/// Test responses with an unknown id are dropped
#[test]
fn test_unknown_id_dropped() {
    let (mut chat, server) = connected(config());
    let (errors, e) = counter();
    chat.on_parsing_error(move |_| *e.borrow_mut() += 1);
    let id = chat
        .join_topic("topic-1", |_| panic!("wrong continuation"), |_| panic!("wrong continuation"))
        .unwrap();

    respond(&server, "actionJoinTopic-999", json!({"topicId": "topic-1"}));
    chat.tick(Duration::ZERO);

    assert!(chat.is_pending(&id));
    assert_eq!(*errors.borrow(), 0);
}

/// Test a response naming another method family does not resolve the request
#[test]
fn test_method_family_mismatch_ignored() {
    let (mut chat, server) = connected(config());
    let id = chat.send_chat("t", "m", |_| panic!("wrong family"), |_| {}).unwrap();

    server.deliver_enveloped(&json!({"jsonrpc": "2.0", "id": id, "method": "queryChat", "result": {}}));
    chat.tick(Duration::ZERO);
    assert!(chat.is_pending(&id));
}

/// Test malformed JSON fires the parsing error callback and leaves requests pending
#[test]
fn test_malformed_message() {
    let (mut chat, server) = connected(config());
    let (errors, e) = counter();
    chat.on_parsing_error(move |err| {
        assert!(matches!(err, Error::Json(_)));
        *e.borrow_mut() += 1;
    });
    let id = chat.query_topic_by_id("topic-1", |_| {}, |_| {}).unwrap();

    server.deliver("CaSr{\"jsonrpc\": oops CaEd");
    chat.tick(Duration::ZERO);

    assert_eq!(*errors.borrow(), 1);
    assert!(chat.is_pending(&id));
}

/// Test the public topic listing decodes into its own response shape
#[test]
fn test_query_public_topic() {
    let (mut chat, server) = connected(config());
    let topics: Rc<RefCell<Vec<PublicTopicInfo>>> = Rc::new(RefCell::new(Vec::new()));
    let t = topics.clone();
    let id = chat
        .query_public_topic(
            &QueryTopicRequest::new("lobby", 0, 10),
            move |resp| t.borrow_mut().extend(resp.data),
            |_| {},
        )
        .unwrap();
    assert_eq!(server.last_request().unwrap()["method"], "queryPublicTopic");

    respond(
        &server,
        &id,
        json!({"data": [{"topicId": "p-1", "name": "Lobby"}], "processed": 1}),
    );
    chat.tick(Duration::ZERO);

    assert_eq!(
        *topics.borrow(),
        vec![PublicTopicInfo {
            topic_id: "p-1".to_string(),
            name: "Lobby".to_string()
        }]
    );
}

/// Test an object with neither id nor method is reported as unparseable
#[test]
fn test_message_without_id_or_method() {
    let (mut chat, server) = connected(config());
    let (errors, e) = counter();
    chat.on_parsing_error(move |err| {
        assert!(matches!(err, Error::Parse(_)));
        *e.borrow_mut() += 1;
    });

    server.deliver("CaSr{\"foo\":1}CaEd");
    server.deliver_enveloped(&json!({"jsonrpc": "2.0", "id": "nobody-1", "result": {}}));
    notify(&server, "eventSomethingNew", json!({}));
    chat.tick(Duration::ZERO);

    assert_eq!(*errors.borrow(), 1);
}

/// Test a message fragmented across the first ticks after connect reassembles
#[test]
fn test_fragments_in_first_tick_after_connect() {
    let server = FakeServer::new();
    let mut chat = ChatClient::new(config(), server.factory());
    let (chats, c) = counter();
    let (errors, e) = counter();
    chat.on_chat(move |_| *c.borrow_mut() += 1);
    chat.on_parsing_error(move |_| *e.borrow_mut() += 1);

    chat.connect();
    server.accept();
    server.deliver("CaSr{\"jsonrpc\":\"2.0\",\"method\":\"eventNew");
    chat.tick(Duration::ZERO);
    server.deliver("Chat\",\"params\":{\"topicId\":\"t\"}}CaEd");
    chat.tick(Duration::ZERO);

    assert_eq!(*chats.borrow(), 1);
    assert_eq!(*errors.borrow(), 0);
}

/// Test a message that arrived before the close is handled before the close callback
#[test]
fn test_message_before_close_keeps_order() {
    let (mut chat, server) = connected(config());
    let log = Rc::new(RefCell::new(Vec::new()));
    let (l1, l2) = (log.clone(), log.clone());
    chat.on_chat(move |n| l1.borrow_mut().push(format!("chat:{}", n.message)));
    chat.on_connection_closed(move |code, _, _| l2.borrow_mut().push(format!("closed:{}", code)));

    notify(&server, "eventNewChat", json!({"topicId": "t", "message": "bye"}));
    server.close(1001, "going away");
    chat.tick(Duration::ZERO);

    assert_eq!(*log.borrow(), vec!["chat:bye", "closed:1001"]);
    assert_eq!(chat.state(), ConnectionState::Reconnecting);
}

/// Test out-of-range jitter loaded from JSON never panics the reconnect loop
#[test]
fn test_out_of_range_jitter_from_json() {
    let config = ChatConfig::from_json(
        r#"{"url":"ws://fake/chat/","connection":{"backoff_jitter":3.0}}"#,
    )
    .unwrap();
    assert!(config.validate().is_err());

    let (mut chat, server) = connected(config);
    for _ in 0..5 {
        server.close(1001, "going away");
        chat.tick(Duration::ZERO);
        chat.tick(Duration::from_secs(1));
        server.accept();
        chat.tick(Duration::ZERO);
        assert!(chat.is_connected());
    }
}

/// Test notification handlers fire once and replace rather than stack
#[test]
fn test_notification_handler_replaced() {
    let (mut chat, server) = connected(config());
    let (first, f) = counter();
    let (second, s) = counter();
    chat.on_chat(move |_| *f.borrow_mut() += 1);
    chat.on_chat(move |_| *s.borrow_mut() += 1);

    notify(&server, "eventNewChat", json!({"topicId": "t", "message": "yo"}));
    chat.tick(Duration::ZERO);

    assert_eq!(*first.borrow(), 0);
    assert_eq!(*second.borrow(), 1);
}

/// Test a notification split over three frames
#[test]
fn test_three_fragment_notification() {
    let (mut chat, server) = connected(config());
    let got = Rc::new(RefCell::new(Vec::new()));
    let g = got.clone();
    chat.on_chat(move |n: ChatNotif| g.borrow_mut().push(n.message));

    server.deliver_all([
        "CaSr{\"jsonrpc\":\"2.0\",\"method\":\"eventNe",
        "wChat\",\"params\":{\"message\":\"hel",
        "lo\"}}CaEd",
    ]);
    chat.tick(Duration::ZERO);

    assert_eq!(*got.borrow(), vec!["hello".to_string()]);
}

/// Test randomly fragmented, noisy streams reassemble in order
#[test]
fn test_random_fragmentation() {
    let (mut chat, server) = connected(config());
    let got = Rc::new(RefCell::new(Vec::new()));
    let g = got.clone();
    chat.on_chat(move |n: ChatNotif| g.borrow_mut().push(n.message));

    let mut fragmenter = Fragmenter::noisy();
    for i in 0..100 {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "eventNewChat",
            "params": {"topicId": "t", "message": format!("msg-{} ✓", i)}
        })
        .to_string();
        server.deliver_all(fragmenter.fragment(&payload));
        if i % 7 == 0 {
            chat.tick(Duration::from_millis(16));
        }
    }
    chat.tick(Duration::from_millis(16));

    let expected: Vec<String> = (0..100).map(|i| format!("msg-{} ✓", i)).collect();
    assert_eq!(*got.borrow(), expected);
}

/// Test a payload that does not fit the handler type is a parsing error
#[test]
fn test_bad_notification_payload() {
    let (mut chat, server) = connected(config());
    let (errors, e) = counter();
    let (chats, c) = counter();
    chat.on_parsing_error(move |_| *e.borrow_mut() += 1);
    chat.on_chat(move |_| *c.borrow_mut() += 1);

    notify(&server, "eventNewChat", json!({"message": 5}));
    chat.tick(Duration::ZERO);

    assert_eq!(*errors.borrow(), 1);
    assert_eq!(*chats.borrow(), 0);
}

/// Test requests are refused while disconnected
#[test]
fn test_request_requires_connection() {
    let server = FakeServer::new();
    let mut chat = ChatClient::new(config(), server.factory());
    let result = chat.send_chat("t", "m", |_| {}, |_| {});
    assert!(matches!(result, Err(Error::NotConnected)));
    assert_eq!(chat.pending_requests(), 0);
}

/// Test a failed send leaves nothing pending
#[test]
fn test_send_failure_cancels_request() {
    let (mut chat, server) = connected(config());
    server.fail_sends(true);
    let result = chat.quit_topic("t", |_| {}, |_| {});
    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(chat.pending_requests(), 0);
}

/// Test disconnect twice has no further effect and stops reconnecting
#[test]
fn test_disconnect_idempotent() {
    let (mut chat, server) = connected(config());
    chat.disconnect();
    chat.disconnect();

    assert_eq!(chat.state(), ConnectionState::Disconnected);
    assert!(!server.is_connected());
    chat.tick(Duration::from_secs(120));
    assert_eq!(server.sockets_created(), 1);
}

/// Test a partial message does not survive a disconnect
#[test]
fn test_partial_dropped_on_disconnect() {
    let (mut chat, server) = connected(config());
    let (chats, c) = counter();
    let (errors, e) = counter();
    chat.on_chat(move |_| *c.borrow_mut() += 1);
    chat.on_parsing_error(move |_| *e.borrow_mut() += 1);

    server.deliver("CaSr{\"jsonrpc\":\"2.0\",");
    chat.tick(Duration::ZERO);
    chat.disconnect();

    chat.connect();
    server.accept();
    chat.tick(Duration::ZERO);
    server.deliver("\"method\":\"eventNewChat\",\"params\":{}}CaEd");
    chat.tick(Duration::ZERO);

    assert_eq!(*chats.borrow(), 0);
    assert_eq!(*errors.borrow(), 1);
}

/// Test pending requests are silently abandoned on disconnect by default
#[test]
fn test_pending_abandoned_by_default() {
    let (mut chat, server) = connected(config());
    let (fired, f) = counter();
    let f2 = f.clone();
    chat.read_chat(
        vec!["chat-1".to_string()],
        move |_| *f.borrow_mut() += 1,
        move |_| *f2.borrow_mut() += 1,
    )
    .unwrap();

    server.drop_connection("reset");
    chat.tick(Duration::ZERO);
    chat.disconnect();

    assert_eq!(*fired.borrow(), 0);
}

/// Test opting in fails every pending request when the connection drops
#[test]
fn test_fail_pending_on_disconnect() {
    let (mut chat, server) = connected(config().with_fail_pending_on_disconnect(true));
    let failures = Rc::new(RefCell::new(Vec::new()));
    for topic in ["a", "b"] {
        let failures = failures.clone();
        chat.query_topic_by_id(
            topic,
            |_| panic!("no response expected"),
            move |e| failures.borrow_mut().push(matches!(e, Error::Disconnected)),
        )
        .unwrap();
    }

    server.drop_connection("reset");
    chat.tick(Duration::ZERO);

    assert_eq!(*failures.borrow(), vec![true, true]);
    assert_eq!(chat.pending_requests(), 0);
    assert_eq!(chat.state(), ConnectionState::Reconnecting);
}

/// Test message ids stay unique across a reconnect
#[test]
fn test_ids_unique_across_reconnect() {
    let (mut chat, server) = connected(config());
    let first = chat.send_chat("t", "one", |_| {}, |_| {}).unwrap();

    server.drop_connection("reset");
    chat.tick(Duration::ZERO);
    chat.tick(Duration::from_secs(1));
    server.accept();
    chat.tick(Duration::ZERO);
    assert!(chat.is_connected());

    let second = chat.send_chat("t", "two", |_| {}, |_| {}).unwrap();
    assert_ne!(first, second);
}

/// Test unbind_all silences every callback
#[test]
fn test_unbind_all() {
    let (mut chat, server) = connected(config());
    let (calls, c) = counter();
    let c2 = c.clone();
    chat.on_chat(move |_| *c.borrow_mut() += 1);
    chat.on_connection_closed(move |_, _, _| *c2.borrow_mut() += 1);
    chat.unbind_all();

    notify(&server, "eventNewChat", json!({}));
    server.close(1000, "bye");
    chat.tick(Duration::ZERO);

    assert_eq!(*calls.borrow(), 0);
}
