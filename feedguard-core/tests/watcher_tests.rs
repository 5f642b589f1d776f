// tests/watcher_tests.rs

use std::sync::{Arc, Weak};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::sleep;

use feedguard_common::models::{FilterAction, NodeId};
use feedguard_common::traits::HostDom;
use feedguard_core::dom::MemoryDom;
use feedguard_core::engine::apply::PLACEHOLDER_CLASS;
use feedguard_core::tasks::{MessageSink, MutationWatcher};
use feedguard_core::test_utils::helpers::ChatPage;
use feedguard_core::{Error, FilterConfig, FilterEngine, MemoryWhitelistStore};

/// Records every batch it is handed.
#[derive(Default)]
struct RecordingSink {
    added: Mutex<Vec<Vec<NodeId>>>,
    removed: Mutex<Vec<Vec<NodeId>>>,
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn messages_added(&self, nodes: Vec<NodeId>) {
        self.added.lock().push(nodes);
    }

    fn messages_removed(&self, nodes: Vec<NodeId>) {
        self.removed.lock().push(nodes);
    }
}

fn watcher_for(page: &ChatPage, sink: &Arc<RecordingSink>) -> MutationWatcher {
    let weak: Weak<dyn MessageSink> = Arc::downgrade(sink) as Weak<dyn MessageSink>;
    MutationWatcher::new(page.dom.clone(), &FilterConfig::default(), weak)
}

#[tokio::test(start_paused = true)]
async fn test_start_delivers_existing_messages() -> Result<(), Error> {
    let page = ChatPage::new()?;
    let a = page.push(Some("alice"), "one")?;
    page.push_divider("Yesterday")?;
    let b = page.push(None, "two")?;
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_for(&page, &sink);

    watcher.start().await;
    assert!(watcher.is_running());
    assert_eq!(*sink.added.lock(), vec![vec![a, b]]);
    watcher.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_insertions_are_debounced_into_one_batch() -> Result<(), Error> {
    let page = ChatPage::new()?;
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_for(&page, &sink);
    watcher.start().await;

    let first = page.push(Some("alice"), "one")?;
    sleep(Duration::from_millis(20)).await;
    let second = page.push(None, "two")?;
    let third = page.push(Some("bob"), "three")?;
    sleep(Duration::from_millis(10)).await;
    assert!(sink.added.lock().is_empty(), "still inside the debounce window");

    sleep(Duration::from_millis(30)).await;
    assert_eq!(*sink.added.lock(), vec![vec![first, second, third]]);
    watcher.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_removed_messages_are_forwarded() -> Result<(), Error> {
    let page = ChatPage::new()?;
    let gone = page.push(Some("alice"), "bye")?;
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_for(&page, &sink);
    watcher.start().await;

    page.dom.remove(gone)?;
    sleep(Duration::from_millis(60)).await;
    assert_eq!(*sink.removed.lock(), vec![vec![gone]]);
    assert_eq!(sink.added.lock().len(), 1, "only the initial scan");
    watcher.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_content_injected_into_message_requeues_it() -> Result<(), Error> {
    let page = ChatPage::new()?;
    let m = page.push(Some("bob"), "look")?;
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_for(&page, &sink);
    watcher.start().await;

    let content = page.content_of(m).unwrap();
    let embed = page.dom.element("div", &["embedWrapper_q1"], &[]);
    page.dom.append_text(embed, "preview")?;
    page.dom.append_child(content, embed)?;
    sleep(Duration::from_millis(60)).await;

    assert_eq!(sink.added.lock().last(), Some(&vec![m]));
    watcher.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_placeholders_are_ignored() -> Result<(), Error> {
    let page = ChatPage::new()?;
    let m = page.push(Some("bob"), "spam")?;
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_for(&page, &sink);
    watcher.start().await;

    let placeholder = page.dom.element("div", &[PLACEHOLDER_CLASS], &[]);
    page.dom.append_child(m, placeholder)?;
    sleep(Duration::from_millis(60)).await;
    assert_eq!(sink.added.lock().len(), 1, "no batch for our own placeholder");
    watcher.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_disconnects() -> Result<(), Error> {
    let page = ChatPage::new()?;
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_for(&page, &sink);
    watcher.start().await;
    assert_eq!(page.dom.observer_count(), 1);

    page.push(Some("alice"), "buffered")?;
    watcher.stop();
    assert!(!watcher.is_running());
    assert_eq!(page.dom.observer_count(), 0);

    page.push(Some("alice"), "unseen")?;
    sleep(Duration::from_millis(200)).await;
    assert!(sink.added.lock().is_empty(), "buffered records are dropped on stop");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_replaced_container_is_rescanned() -> Result<(), Error> {
    let page = ChatPage::new()?;
    page.push(Some("alice"), "old")?;
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_for(&page, &sink);
    watcher.start().await;

    // host navigates: the whole list is swapped for a new one
    let main = page.dom.parent(page.list).unwrap();
    page.dom.remove(page.list)?;
    let new_list = page.dom.element("ol", &[], &[("data-list-id", "chat-messages")]);
    let msg = page.dom.element("li", &[], &[("id", "chat-messages-2-1")]);
    page.dom.append_child(new_list, msg)?;
    page.dom.append_child(main, new_list)?;
    sleep(Duration::from_millis(60)).await;

    assert_eq!(sink.added.lock().last(), Some(&vec![msg]));

    // later insertions into the new list are still seen
    let later = page.dom.element("li", &[], &[("id", "chat-messages-2-2")]);
    page.dom.append_child(new_list, later)?;
    sleep(Duration::from_millis(60)).await;
    assert_eq!(sink.added.lock().last(), Some(&vec![later]));
    watcher.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_recycled_id_is_resolved_again() -> Result<(), Error> {
    let page = ChatPage::new()?;
    let old = page.push(Some("bob"), "first render")?;
    let id = page.id_of(old);
    let store = Arc::new(MemoryWhitelistStore::with_users(["alice"])?);
    let engine = FilterEngine::new(page.dom.clone(), store, FilterConfig::default())?;
    engine.initialize().await;
    assert_eq!(engine.cached_result(&id).and_then(|r| r.username).as_deref(), Some("bob"));

    page.dom.remove(old)?;
    sleep(Duration::from_millis(60)).await;
    assert!(engine.cached_result(&id).is_none(), "removal purges the cache");

    let rerender = page.build_message(Some("alice"), "second render")?;
    page.dom.set_attribute(rerender, "id", &id)?;
    page.dom.append_child(page.list, rerender)?;
    sleep(Duration::from_millis(60)).await;

    assert_eq!(engine.cached_result(&id).and_then(|r| r.username).as_deref(), Some("alice"));
    assert_eq!(page.dom.attribute(rerender, "data-feedguard-state").as_deref(), Some("show"));
    engine.shutdown();
    Ok(())
}

/// Message row shaped like the host's, not yet attached anywhere.
fn detached_message(dom: &MemoryDom, id: &str, author: &str, text: &str) -> Result<NodeId, Error> {
    let li = dom.element("li", &["messageListItem_c3"], &[("id", id)]);
    let body = dom.element("div", &["message_d4", "groupStart_e5"], &[("role", "article")]);
    dom.append_child(li, body)?;
    let contents = dom.element("div", &["contents_f6"], &[]);
    dom.append_child(body, contents)?;
    let header = dom.element("h3", &["header_j0"], &[]);
    dom.append_child(contents, header)?;
    let name = dom.element("span", &["username_h8"], &[]);
    dom.append_child(header, name)?;
    dom.append_text(name, author)?;
    let content = dom.element("div", &["messageContent_m3"], &[]);
    dom.append_child(contents, content)?;
    dom.append_text(content, text)?;
    Ok(li)
}

#[tokio::test(start_paused = true)]
async fn test_container_rendered_after_start_is_adopted() -> Result<(), Error> {
    let dom = Arc::new(MemoryDom::new());
    let store = Arc::new(MemoryWhitelistStore::with_users(["alice"])?);
    let engine = FilterEngine::new(dom.clone(), store, FilterConfig::default())?;
    engine.initialize().await;
    assert_eq!(dom.observer_count(), 1, "observing the document until the list shows up");

    let list = dom.element("ol", &[], &[("data-list-id", "chat-messages")]);
    let first = detached_message(&dom, "chat-messages-1-1", "bob", "spam")?;
    dom.append_child(list, first)?;
    dom.append_child(dom.document(), list)?;
    sleep(Duration::from_millis(60)).await;
    assert_eq!(engine.applied_action("chat-messages-1-1"), Some(FilterAction::Collapse));

    let second = detached_message(&dom, "chat-messages-1-2", "alice", "hi")?;
    dom.append_child(list, second)?;
    sleep(Duration::from_millis(60)).await;
    assert_eq!(engine.applied_action("chat-messages-1-2"), Some(FilterAction::Show));
    engine.shutdown();
    Ok(())
}
