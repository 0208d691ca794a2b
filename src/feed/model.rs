use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::debug;

use crate::message::{self, model::Message};
use crate::thread;

/// State of one optimistic send. `Pending` moves to exactly one of the
/// other three and never leaves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Pending,
    /// The placeholder was replaced by the backend copy.
    Confirmed,
    /// The backend copy was already merged or deleted, so the placeholder
    /// was dropped instead.
    Superseded,
    RolledBack,
}

pub type Generation = u64;

/// Time-ordered messages of the active thread.
///
/// Every mutation is keyed by message id and tolerates repeats, so bulk
/// loads, realtime events and send confirmations can be applied in any order.
///
/// `sends` holds the sends in flight plus the most recently settled one.
/// `tombstones` holds the ids deleted while the thread has been active, so it
/// is bounded by the thread's size and emptied on a thread switch.
#[derive(Default, Debug)]
pub struct Feed {
    thread_id: Option<thread::Id>,
    generation: Generation,
    messages: Vec<Message>,
    sends: HashMap<message::Id, Disposition>,
    tombstones: HashSet<message::Id>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn thread_id(&self) -> Option<&thread::Id> {
        self.thread_id.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_active(&self, thread_id: &thread::Id) -> bool {
        self.thread_id.as_ref() == Some(thread_id)
    }

    pub fn contains(&self, id: &message::Id) -> bool {
        self.position(id).is_some()
    }

    pub fn disposition(&self, temp_id: &message::Id) -> Option<Disposition> {
        self.sends.get(temp_id).copied()
    }

    pub fn subject_title(&self) -> Option<&str> {
        self.messages.iter().find_map(Message::post_title)
    }
}

// loading
impl Feed {
    /// Starts a new load generation for `thread_id`.
    ///
    /// Switching threads forgets everything about the previous one. Reloading
    /// the active thread keeps only the placeholders of sends still in flight.
    pub fn enter(&mut self, thread_id: &thread::Id) -> Generation {
        self.generation += 1;

        if self.is_active(thread_id) {
            let sends = &self.sends;
            self.messages.retain(|m| is_in_flight(sends, m.id()));
        } else {
            debug!("switching feed to thread {thread_id}");
            self.thread_id = Some(thread_id.clone());
            self.messages.clear();
            self.sends.clear();
            self.tombstones.clear();
        }

        self.generation
    }

    /// Seeds the list from a bulk load. Entries merged since [`Feed::enter`]
    /// are kept. Returns `false` and changes nothing when `generation` is stale.
    pub fn replace(&mut self, generation: Generation, loaded: Vec<Message>) -> bool {
        if generation != self.generation {
            return false;
        }

        let arrived = std::mem::take(&mut self.messages);
        for msg in loaded.into_iter().chain(arrived) {
            self.merge(msg);
        }

        true
    }

    /// Empties the list after a failed load, except for sends in flight.
    pub fn clear(&mut self, generation: Generation) -> bool {
        if generation != self.generation {
            return false;
        }

        let sends = &self.sends;
        self.messages.retain(|m| is_in_flight(sends, m.id()));

        true
    }
}

// realtime
impl Feed {
    /// Inserts `message` at its place in time unless its id is already known.
    pub fn merge(&mut self, message: Message) -> bool {
        if !self.is_active(message.thread_id()) {
            debug!("ignoring message {} of inactive thread", message.id());
            return false;
        }

        if self.tombstones.contains(message.id()) {
            debug!("ignoring deleted message {}", message.id());
            return false;
        }

        if self.contains(message.id()) {
            return false;
        }

        let at = self.insertion_point(message.created_at());
        self.messages.insert(at, message);
        true
    }

    /// Removes a persisted message and remembers the id so a late insert
    /// event or send confirmation cannot bring it back.
    pub fn remove(&mut self, id: &message::Id) -> bool {
        if id.is_temp() {
            return false;
        }

        self.tombstones.insert(id.clone());

        match self.position(id) {
            Some(idx) => {
                self.messages.remove(idx);
                true
            }
            None => false,
        }
    }
}

// optimistic sends
impl Feed {
    /// Shows `placeholder` right away and tracks its send as pending.
    pub fn begin_send(&mut self, placeholder: Message) -> Option<message::Id> {
        if !placeholder.is_pending() || !self.is_active(placeholder.thread_id()) {
            return None;
        }

        let temp_id = placeholder.id().clone();
        let at = self.insertion_point(placeholder.created_at());
        self.messages.insert(at, placeholder);
        self.sends.insert(temp_id.clone(), Disposition::Pending);

        Some(temp_id)
    }

    /// Settles a successful send with the backend's copy of the message.
    ///
    /// A send the feed no longer tracks (the thread changed meanwhile) counts
    /// as superseded.
    pub fn confirm(&mut self, temp_id: &message::Id, confirmed: Message) -> Disposition {
        match self.disposition(temp_id) {
            Some(Disposition::Pending) => {}
            Some(settled) => return settled,
            None => return Disposition::Superseded,
        }

        let known = self.contains(confirmed.id()) || self.tombstones.contains(confirmed.id());
        let outcome = if known {
            self.drop_placeholder(temp_id);
            Disposition::Superseded
        } else if let Some(idx) = self.position(temp_id) {
            self.messages[idx] = confirmed;
            self.reposition(idx);
            Disposition::Confirmed
        } else {
            self.merge(confirmed);
            Disposition::Confirmed
        };

        self.settle(temp_id, outcome);
        outcome
    }

    pub fn roll_back(&mut self, temp_id: &message::Id) -> Disposition {
        match self.disposition(temp_id) {
            Some(Disposition::Pending) => self.settle(temp_id, Disposition::RolledBack),
            Some(settled) => return settled,
            None => {}
        }

        self.drop_placeholder(temp_id);
        Disposition::RolledBack
    }
}

impl Feed {
    /// Records the outcome and forgets older settled sends.
    fn settle(&mut self, temp_id: &message::Id, outcome: Disposition) {
        self.sends
            .retain(|id, state| *state == Disposition::Pending || id == temp_id);
        self.sends.insert(temp_id.clone(), outcome);
    }

    fn position(&self, id: &message::Id) -> Option<usize> {
        self.messages.iter().position(|m| m.id() == id)
    }

    /// After any existing entry with the same timestamp, so ties keep arrival order.
    fn insertion_point(&self, at: &DateTime<Utc>) -> usize {
        self.messages.partition_point(|m| m.created_at() <= at)
    }

    fn drop_placeholder(&mut self, temp_id: &message::Id) {
        if let Some(idx) = self.position(temp_id) {
            self.messages.remove(idx);
        }
    }

    /// Moves the entry at `idx` only if its timestamp no longer fits there.
    fn reposition(&mut self, idx: usize) {
        let at = *self.messages[idx].created_at();
        let fits_before = idx == 0 || *self.messages[idx - 1].created_at() <= at;
        let fits_after = self
            .messages
            .get(idx + 1)
            .is_none_or(|next| at <= *next.created_at());

        if fits_before && fits_after {
            return;
        }

        let msg = self.messages.remove(idx);
        let to = self.insertion_point(&at);
        self.messages.insert(to, msg);
    }
}

fn is_in_flight(sends: &HashMap<message::Id, Disposition>, id: &message::Id) -> bool {
    sends.get(id) == Some(&Disposition::Pending)
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use crate::message::model::NewMessage;
    use crate::user;

    use super::*;

    struct Fixture {
        thread: thread::Id,
        me: user::Id,
        you: user::Id,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                thread: thread::Id::random(),
                me: user::Id::random(),
                you: user::Id::random(),
            }
        }

        fn draft(&self, text: &str) -> NewMessage {
            NewMessage::new(&self.thread, &self.me, Some(&self.you), text, None).unwrap()
        }

        fn message(&self, text: &str, secs: i64) -> Message {
            Message::new(message::Id::random(), &self.draft(text), at(secs))
        }

        fn placeholder(&self, text: &str, secs: i64) -> Message {
            Message::pending(&self.draft(text), at(secs))
        }

        fn feed(&self) -> Feed {
            let mut feed = Feed::new();
            feed.enter(&self.thread);
            feed
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn texts(feed: &Feed) -> Vec<&str> {
        feed.messages().iter().map(Message::text).collect()
    }

    fn assert_sorted(feed: &Feed) {
        assert!(
            feed.messages()
                .windows(2)
                .all(|w| w[0].created_at() <= w[1].created_at()),
            "feed is not ordered by created_at"
        );
    }

    #[test]
    fn should_merge_in_time_order() {
        let f = Fixture::new();
        let mut feed = f.feed();

        feed.merge(f.message("b", 20));
        feed.merge(f.message("c", 30));
        feed.merge(f.message("a", 10));

        assert_eq!(texts(&feed), ["a", "b", "c"]);
        assert_sorted(&feed);
    }

    #[test]
    fn should_keep_arrival_order_on_equal_timestamps() {
        let f = Fixture::new();
        let mut feed = f.feed();

        feed.merge(f.message("first", 10));
        feed.merge(f.message("second", 10));
        feed.merge(f.message("third", 10));

        assert_eq!(texts(&feed), ["first", "second", "third"]);
    }

    #[test]
    fn should_merge_same_id_once() {
        let f = Fixture::new();
        let mut feed = f.feed();
        let msg = f.message("hello", 10);

        assert!(feed.merge(msg.clone()));
        assert!(!feed.merge(msg));

        assert_eq!(feed.messages().len(), 1);
    }

    #[test]
    fn should_ignore_message_of_other_thread() {
        let f = Fixture::new();
        let other = Fixture::new();
        let mut feed = f.feed();

        assert!(!feed.merge(other.message("elsewhere", 10)));
        assert!(feed.messages().is_empty());
    }

    #[test]
    fn should_ignore_remove_of_unknown_id() {
        let f = Fixture::new();
        let mut feed = f.feed();
        feed.merge(f.message("hello", 10));

        assert!(!feed.remove(&message::Id::random()));
        assert_eq!(texts(&feed), ["hello"]);
    }

    #[test]
    fn should_not_resurrect_removed_message() {
        let f = Fixture::new();
        let mut feed = f.feed();
        let msg = f.message("hello", 10);

        // delete event overtakes the insert event
        assert!(!feed.remove(msg.id()));
        assert!(!feed.merge(msg));

        assert!(feed.messages().is_empty());
    }

    #[test]
    fn should_replace_placeholder_on_confirm() {
        let f = Fixture::new();
        let mut feed = f.feed();
        feed.merge(f.message("before", 5));

        let temp_id = feed.begin_send(f.placeholder("hello", 10)).unwrap();
        assert_eq!(feed.disposition(&temp_id), Some(Disposition::Pending));

        let confirmed = f.message("hello", 11);
        let confirmed_id = confirmed.id().clone();

        assert_eq!(feed.confirm(&temp_id, confirmed), Disposition::Confirmed);
        assert_eq!(texts(&feed), ["before", "hello"]);
        assert_eq!(feed.messages()[1].id(), &confirmed_id);
        assert!(!feed.contains(&temp_id));
        assert_eq!(feed.disposition(&temp_id), Some(Disposition::Confirmed));
    }

    #[test]
    fn should_drop_placeholder_when_echo_came_first() {
        let f = Fixture::new();
        let mut feed = f.feed();

        let temp_id = feed.begin_send(f.placeholder("hello", 10)).unwrap();
        let confirmed = f.message("hello", 11);
        feed.merge(confirmed.clone());
        assert_eq!(feed.messages().len(), 2);

        assert_eq!(feed.confirm(&temp_id, confirmed.clone()), Disposition::Superseded);
        assert_eq!(feed.messages(), [confirmed]);
    }

    #[test]
    fn should_drop_placeholder_when_confirmed_message_was_deleted() {
        let f = Fixture::new();
        let mut feed = f.feed();

        let temp_id = feed.begin_send(f.placeholder("hello", 10)).unwrap();
        let confirmed = f.message("hello", 11);
        feed.remove(confirmed.id());

        assert_eq!(feed.confirm(&temp_id, confirmed), Disposition::Superseded);
        assert!(feed.messages().is_empty());
    }

    #[test]
    fn should_restore_list_on_roll_back() {
        let f = Fixture::new();
        let mut feed = f.feed();
        feed.merge(f.message("a", 5));
        feed.merge(f.message("b", 6));
        let before = feed.messages().to_vec();

        let temp_id = feed.begin_send(f.placeholder("hello", 10)).unwrap();
        assert_eq!(feed.roll_back(&temp_id), Disposition::RolledBack);

        assert_eq!(feed.messages(), before.as_slice());
        assert_eq!(feed.disposition(&temp_id), Some(Disposition::RolledBack));
    }

    #[test]
    fn settled_send_should_not_change_state_again() {
        let f = Fixture::new();
        let mut feed = f.feed();

        let temp_id = feed.begin_send(f.placeholder("hello", 10)).unwrap();
        feed.roll_back(&temp_id);

        assert_eq!(feed.confirm(&temp_id, f.message("hello", 11)), Disposition::RolledBack);
        assert!(feed.messages().is_empty());
    }

    #[test]
    fn should_only_remember_latest_settled_send() {
        let f = Fixture::new();
        let mut feed = f.feed();

        let first = feed.begin_send(f.placeholder("one", 10)).unwrap();
        let second = feed.begin_send(f.placeholder("two", 11)).unwrap();
        let third = feed.begin_send(f.placeholder("three", 12)).unwrap();
        feed.confirm(&first, f.message("one", 13));
        feed.roll_back(&second);

        assert_eq!(feed.disposition(&first), None);
        assert_eq!(feed.disposition(&second), Some(Disposition::RolledBack));
        assert_eq!(feed.disposition(&third), Some(Disposition::Pending));

        // a forgotten send never touches the list again
        assert_eq!(feed.confirm(&first, f.message("one", 14)), Disposition::Superseded);
        assert_eq!(texts(&feed), ["three", "one"]);
    }

    #[test]
    fn should_move_confirmed_message_to_its_server_time() {
        let f = Fixture::new();
        let mut feed = f.feed();

        let temp_id = feed.begin_send(f.placeholder("mine", 10)).unwrap();
        feed.merge(f.message("theirs", 20));

        // server clock is ahead of ours
        feed.confirm(&temp_id, f.message("mine", 30));

        assert_eq!(texts(&feed), ["theirs", "mine"]);
        assert_sorted(&feed);
    }

    #[test]
    fn should_reject_placeholder_for_inactive_thread() {
        let f = Fixture::new();
        let other = Fixture::new();
        let mut feed = f.feed();

        assert!(feed.begin_send(other.placeholder("hello", 10)).is_none());
        assert!(feed.begin_send(f.message("persisted", 10)).is_none());
    }

    #[test]
    fn should_discard_stale_load() {
        let a = Fixture::new();
        let b = Fixture::new();
        let mut feed = Feed::new();

        let stale = feed.enter(&a.thread);
        let current = feed.enter(&b.thread);

        assert!(!feed.replace(stale, vec![a.message("from a", 10)]));
        assert!(feed.replace(current, vec![b.message("from b", 10)]));

        assert_eq!(feed.thread_id(), Some(&b.thread));
        assert_eq!(texts(&feed), ["from b"]);
    }

    #[test]
    fn should_keep_events_that_arrived_during_load() {
        let f = Fixture::new();
        let mut feed = Feed::new();
        let loaded = vec![f.message("a", 10), f.message("b", 20)];
        let echo = loaded[1].clone();

        let generation = feed.enter(&f.thread);
        feed.merge(echo);
        feed.merge(f.message("c", 30));
        feed.replace(generation, loaded);

        assert_eq!(texts(&feed), ["a", "b", "c"]);
    }

    #[test]
    fn reload_should_keep_sends_in_flight() {
        let f = Fixture::new();
        let mut feed = f.feed();
        feed.merge(f.message("old", 5));
        let temp_id = feed.begin_send(f.placeholder("hello", 10)).unwrap();

        let generation = feed.enter(&f.thread);
        assert_eq!(feed.messages().len(), 1);
        feed.replace(generation, vec![f.message("old", 5)]);

        assert!(feed.contains(&temp_id));
        assert_eq!(feed.confirm(&temp_id, f.message("hello", 11)), Disposition::Confirmed);
        assert_sorted(&feed);
    }

    #[test]
    fn thread_switch_should_forget_previous_sends() {
        let a = Fixture::new();
        let b = Fixture::new();
        let mut feed = a.feed();
        let temp_id = feed.begin_send(a.placeholder("hello", 10)).unwrap();

        feed.enter(&b.thread);

        assert_eq!(feed.disposition(&temp_id), None);
        assert_eq!(feed.confirm(&temp_id, a.message("hello", 11)), Disposition::Superseded);
        assert!(feed.messages().is_empty());
    }

    #[test]
    fn should_clear_on_failed_load_except_sends_in_flight() {
        let f = Fixture::new();
        let mut feed = f.feed();
        feed.merge(f.message("old", 5));
        let temp_id = feed.begin_send(f.placeholder("hello", 10)).unwrap();

        let generation = feed.enter(&f.thread);
        assert!(feed.clear(generation));

        assert_eq!(feed.messages().len(), 1);
        assert!(feed.contains(&temp_id));
    }

    #[test]
    fn should_stay_ordered_under_mixed_operations() {
        let f = Fixture::new();
        let mut feed = f.feed();
        let m1 = f.message("m1", 40);
        let m2 = f.message("m2", 10);

        feed.merge(m1.clone());
        assert_sorted(&feed);
        let t1 = feed.begin_send(f.placeholder("t1", 25)).unwrap();
        assert_sorted(&feed);
        feed.merge(m2.clone());
        assert_sorted(&feed);
        feed.remove(m1.id());
        assert_sorted(&feed);
        feed.merge(m2);
        assert_sorted(&feed);
        feed.confirm(&t1, f.message("t1", 50));
        assert_sorted(&feed);
        feed.merge(f.message("m3", 30));
        assert_sorted(&feed);

        assert_eq!(texts(&feed), ["m2", "m3", "t1"]);
    }

    #[test]
    fn should_expose_subject_title() {
        let f = Fixture::new();
        let mut feed = f.feed();
        assert_eq!(feed.subject_title(), None);

        feed.merge(f.message("hej", 10).with_post_title("Cykel til salg"));

        assert_eq!(feed.subject_title(), Some("Cykel til salg"));
    }
}
