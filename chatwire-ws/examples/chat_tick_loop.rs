//! Chat client driven from a fixed-rate loop.
//!
//! Run with: cargo run --example chat_tick_loop -- ws://127.0.0.1:8080/chat/ <token> <topic>

use std::time::{Duration, Instant};

use chatwire::{ChatClient, ChatConfig};
use chatwire_ws::WsSocketFactory;

const FRAME: Duration = Duration::from_millis(16);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "ws://127.0.0.1:8080/chat/".to_string());
    let token = args.next().unwrap_or_default();
    let topic = args.next().unwrap_or_else(|| "lobby".to_string());

    let config = ChatConfig::new(&url);
    config.validate()?;

    let factory = WsSocketFactory::new(&url).with_bearer(&token);
    let mut chat = ChatClient::new(config, factory);

    chat.on_connect_success(|| println!("connected"));
    chat.on_connect_error(|e| eprintln!("connect error: {}", e));
    chat.on_connection_closed(|code, reason, clean| {
        println!("closed: {} {} (clean: {})", code, reason, clean)
    });
    chat.on_reconnected(|attempts| println!("reconnected after {} attempts", attempts));
    chat.on_reconnect_exhausted(|down| println!("giving up after {:?}", down));
    chat.on_parsing_error(|e| eprintln!("bad message: {}", e));
    chat.on_chat(|notif| println!("[{}] {}: {}", notif.topic_id, notif.sender_id, notif.message));

    chat.connect();

    let mut sent = false;
    let mut last = Instant::now();
    loop {
        let now = Instant::now();
        chat.tick(now - last);
        last = now;

        if chat.is_connected() && !sent {
            chat.send_chat(
                &topic,
                "hello from chatwire",
                |resp| println!("sent as {}", resp.chat_id),
                |e| eprintln!("send failed: {}", e),
            )?;
            sent = true;
        }

        std::thread::sleep(FRAME);
    }
}
