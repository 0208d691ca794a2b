use maud::{Markup, Render, html};

use crate::message::model::Message;
use crate::user;

pub struct FeedView<'a> {
    messages: &'a [Message],
    me: &'a user::Id,
}

impl<'a> FeedView<'a> {
    pub const fn new(messages: &'a [Message], me: &'a user::Id) -> Self {
        Self { messages, me }
    }
}

impl Render for FeedView<'_> {
    fn render(&self) -> Markup {
        html! {
            div #message-list ."flex flex-col" {
                @if self.messages.is_empty() {
                    p.empty-thread ."text-center text-gray-400" { "No messages yet" }
                }
                @for msg in self.messages {
                    (message_item(msg, self.me))
                }
            }
        }
    }
}

pub fn message_item(msg: &Message, me: &user::Id) -> Markup {
    let belongs_to_user = msg.sender_id() == me;
    let pending = msg.is_pending();

    html! {
        .message-item
            id={"m-" (msg.id())}
            ."flex items-center items-baseline"
            .justify-end[belongs_to_user]
            .pending[pending]
        {
            @if belongs_to_user && !pending {
                button.delete-message ."fa-trash-can fa-solid text-red-700 cursor-pointer"
                    data-message-id=(msg.id()) {}
            }

            div.message-bubble
                ."flex flex-row rounded-lg p-2 mt-2 max-w-xs relative"
                ."bg-blue-600 text-white ml-2"[belongs_to_user]
                ."bg-gray-300 text-gray-600"[!belongs_to_user]
                ."opacity-50"[pending] {

                p.message-text ."mr-3 whitespace-normal font-light" { (msg.text()) }
                span.message-timestamp .text-xs { (msg.created_at().format("%H:%M")) }
            }
        }
    }
}
