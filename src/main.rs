use std::sync::Arc;
use std::time::Duration;

use log::info;
use maud::Render;
use tokio::io::{AsyncBufReadExt, BufReader};

use liguster::feed::{FeedController, markup::FeedView};
use liguster::integration::{self, memory::InMemoryBackend};
use liguster::message::model::NewMessage;
use liguster::message::repository::MessageRepository;
use liguster::user::model::UserInfo;
use liguster::{thread, user};

const HELP: &str = "type to send | /peer <text> | /delete <n> | /html | /quit";

// realtime events are applied on their own task
const SETTLE: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> liguster::Result<()> {
    let config = integration::Config::env()?;
    integration::init_logger(&config)?;

    let backend = Arc::new(InMemoryBackend::new(&config.memory));

    let me = user::Id::random();
    let peer = user::Id::random();
    let thread_id = thread::Id::random();
    backend
        .add_user(UserInfo::new(me.clone(), "mig@liguster.local", None))
        .await;
    backend
        .add_user(UserInfo::new(peer.clone(), "nabo@liguster.local", None))
        .await;

    let controller = FeedController::new(
        me.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
    );

    controller.load_thread(&thread_id).await;
    let subscription = controller.subscribe_to_thread(&thread_id).await?;
    info!("joined thread {thread_id}");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "/quit" => break,
            "/html" => {
                let messages = controller.messages().await;
                println!("{}", FeedView::new(&messages, &me).render().into_string());
                continue;
            }
            "/peer" => {
                if let Some(new) = NewMessage::new(&thread_id, &peer, Some(&me), arg, None) {
                    if let Err(e) = backend.insert(&new).await {
                        println!("! {e}");
                    }
                }
            }
            "/delete" => {
                let messages = controller.messages().await;
                let picked = arg
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| messages.get(idx));

                match picked {
                    Some(msg) => {
                        if let Err(e) = controller.delete_message(msg).await {
                            println!("! {}", e.alert());
                        }
                    }
                    None => println!("{HELP}"),
                }
            }
            _ => {
                controller.set_draft(line).await;
                if let Err(e) = controller.send_draft(&thread_id, Some(&peer), None).await {
                    println!("! {}", e.alert());
                }
            }
        }

        tokio::time::sleep(SETTLE).await;
        print_feed(&controller).await;
    }

    subscription.unsubscribe();
    Ok(())
}

async fn print_feed(controller: &FeedController) {
    let participants = controller.resolve_participants().await.unwrap_or_default();

    for (n, msg) in controller.messages().await.iter().enumerate() {
        let sender = participants
            .get(msg.sender_id())
            .map_or("?", |info| info.email());
        let marker = if msg.is_pending() { "…" } else { " " };

        println!(
            "{:>3}{marker} {} {sender}: {}",
            n + 1,
            msg.created_at().format("%H:%M:%S"),
            msg.text()
        );
    }
}
