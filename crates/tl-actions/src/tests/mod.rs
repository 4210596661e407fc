//! Crate-level integration and BDD tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::anyhow;
use mockall::predicate::{always, eq};

use crate::dom::{Document, Event, Listener, NodeId};
use crate::{ActionEngine, Handler, HandlerResult};

pub(crate) mod support;


use support::{LogCapture, MockProbe, Recorder, probe_handler};

fn append(document: &Document, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
    let node = document.create_element_with(tag, attributes.iter().copied());
    document.append_child(parent, node).expect("append");
    node
}

#[test]
fn click_invokes_the_handler_exactly_once() {
    let document = Document::new();
    let button = append(
        &document,
        document.root(),
        "button",
        &[
            ("data-tl-action", "cart:add"),
            ("data-tl-params-sku", "A-1"),
            ("data-tl-params-qty", "2"),
        ],
    );
    let expected: HashMap<String, String> = [("sku", "A-1"), ("qty", "2")]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    let mut probe = MockProbe::new();
    probe
        .expect_called()
        .with(eq("cart:add".to_owned()), eq(expected))
        .times(1)
        .return_const(());
    let engine = ActionEngine::with_defaults(&document).expect("engine");
    engine
        .register("cart", "add", probe_handler(Rc::new(probe)))
        .expect("register")
        .init();
    let logs = LogCapture::default();

    logs.run(|| document.dispatch_event(button, "click"))
        .expect("dispatch");

    assert!(logs.errors().is_empty(), "probe expectations held");
}

#[test]
fn element_outside_any_action_is_ignored_quietly() {
    let document = Document::new();
    let plain = append(&document, document.root(), "div", &[]);
    let mut probe = MockProbe::new();
    probe.expect_called().with(always(), always()).never();
    let engine = ActionEngine::with_defaults(&document).expect("engine");
    engine
        .register("cart", "add", probe_handler(Rc::new(probe)))
        .expect("register")
        .init();
    let logs = LogCapture::default();

    logs.run(|| document.dispatch_event(plain, "click"))
        .expect("dispatch");

    assert!(logs.warnings().is_empty());
    assert!(logs.errors().is_empty());
}

#[test]
fn async_handler_failure_is_logged_once_settled() {
    let document = Document::new();
    let button = append(
        &document,
        document.root(),
        "button",
        &[("data-tl-action", "sync:push")],
    );
    let engine = ActionEngine::with_defaults(&document).expect("engine");
    engine
        .register(
            "sync",
            "push",
            Handler::future(|_| async { HandlerResult::Err(anyhow!("offline")) }),
        )
        .expect("register")
        .init();
    let logs = LogCapture::default();

    logs.run(|| {
        document.dispatch_event(button, "click").expect("dispatch");
        assert!(logs.errors().is_empty());
        document.run_until_stalled();
    });

    let errors = logs.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("action"), Some("sync"));
    assert_eq!(errors[0].field("error"), Some("offline"));
}

#[test]
fn handlers_can_edit_the_tree_they_were_dispatched_from() {
    let document = Document::new();
    let list = append(&document, document.root(), "ul", &[]);
    let adder = append(
        &document,
        document.root(),
        "button",
        &[("data-tl-action", "list:add")],
    );
    let engine = ActionEngine::with_defaults(&document).expect("engine");
    let recorder = Recorder::default();
    let inserted = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&inserted);
    engine
        .register(
            "list",
            "add",
            Handler::sync(move |ctx| {
                let item = ctx.document.create_element_with(
                    "li",
                    [("data-tl-action", "list:remove"), ("data-tl-trigger", "dblclick")],
                );
                ctx.document.append_child(list, item)?;
                *slot.borrow_mut() = Some(item);
                Ok(())
            }),
        )
        .and_then(|engine| engine.register("list", "remove", recorder.handler()))
        .expect("register")
        .init();

    document.dispatch_event(adder, "click").expect("add");
    let item = inserted.borrow_mut().take().expect("item inserted");
    document.dispatch_event(item, "dblclick").expect("remove");

    assert_eq!(recorder.keys(), vec!["list:remove"]);
    assert_eq!(engine.listened_triggers(), vec!["click", "dblclick"]);
}

#[test]
fn custom_attribute_names_drive_the_whole_pipeline() {
    let document = Document::new();
    let field = append(
        &document,
        document.root(),
        "input",
        &[
            ("data-act", "search:query"),
            ("data-on", "input"),
            ("data-arg-min", "3"),
        ],
    );
    let options = crate::EngineOptions::from_json(
        r#"{"actionAttr":"data-act","triggerAttr":"data-on","paramsAttr":"data-arg"}"#,
    )
    .expect("options");
    let engine = ActionEngine::new(&document, options).expect("engine");
    let recorder = Recorder::default();
    engine
        .register("search", "query", recorder.handler())
        .expect("register")
        .init();

    document.dispatch_event(field, "click").expect("click");
    document.dispatch_event(field, "input").expect("input");

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].event_type, "input");
    assert_eq!(calls[0].params.get("min").map(String::as_str), Some("3"));
}

/// Wraps `leaf` in `depth` nested `div`s and returns the outermost one.
fn nest(document: &Document, leaf: NodeId, depth: usize) -> NodeId {
    let mut top = leaf;
    for _ in 0..depth {
        let wrapper = document.create_element("div");
        document.append_child(wrapper, top).expect("wrap");
        top = wrapper;
    }
    top
}

#[test]
fn deeply_nested_markup_scans_and_dispatches() {
    const DEPTH: usize = 20_000;
    let document = Document::new();
    let leaf = document.create_element_with(
        "b",
        [("data-tl-action", "deep:edit"), ("data-tl-trigger", "input")],
    );
    let top = nest(&document, leaf, DEPTH);
    document
        .append_child(document.root(), top)
        .expect("attach");
    let engine = ActionEngine::with_defaults(&document).expect("engine");
    let recorder = Recorder::default();
    engine
        .register("deep", "edit", recorder.handler())
        .and_then(|engine| engine.register("deep", "late", recorder.handler()))
        .expect("register")
        .init();

    document.dispatch_event(leaf, "input").expect("dispatch");

    assert_eq!(engine.listened_triggers(), vec!["click", "input"]);
    assert_eq!(recorder.keys(), vec!["deep:edit"]);

    let late = document.create_element_with(
        "i",
        [("data-tl-action", "deep:late"), ("data-tl-trigger", "change")],
    );
    let late_top = nest(&document, late, DEPTH);
    document
        .append_child(document.root(), late_top)
        .expect("insert");
    document.dispatch_event(late, "change").expect("dispatch");

    assert_eq!(recorder.keys(), vec!["deep:edit", "deep:late"]);
}

#[test]
fn bubbling_stop_propagation_cannot_suppress_dispatch() {
    let document = Document::new();
    let button = append(
        &document,
        document.root(),
        "button",
        &[("data-tl-action", "cart:add")],
    );
    let icon = append(&document, button, "span", &[]);
    let stopper = || -> Listener { Rc::new(|event: &Event| event.stop_propagation()) };
    document.add_event_listener(button, "click", false, stopper());
    document.add_event_listener(icon, "click", false, stopper());
    let engine = ActionEngine::with_defaults(&document).expect("engine");
    let recorder = Recorder::default();
    engine
        .register("cart", "add", recorder.handler())
        .expect("register")
        .init();

    let on_button = document.dispatch_event(button, "click").expect("button");
    let on_icon = document.dispatch_event(icon, "click").expect("icon");

    assert!(on_button.propagation_stopped());
    assert!(on_icon.propagation_stopped());
    assert_eq!(recorder.count(), 2);
}

#[test]
fn default_trigger_ignores_listeners_attached_for_siblings() {
    let document = Document::new();
    let button = append(
        &document,
        document.root(),
        "button",
        &[("data-tl-action", "cart:add")],
    );
    let search = append(
        &document,
        document.root(),
        "input",
        &[("data-tl-action", "search:query"), ("data-tl-trigger", "input")],
    );
    let engine = ActionEngine::with_defaults(&document).expect("engine");
    let recorder = Recorder::default();
    engine
        .register("cart", "add", recorder.handler())
        .and_then(|engine| engine.register("search", "query", recorder.handler()))
        .expect("register")
        .init();
    assert_eq!(engine.listened_triggers(), vec!["click", "input"]);
    let logs = LogCapture::default();

    logs.run(|| {
        document.dispatch_event(button, "input").expect("input on button");
        document.dispatch_event(search, "input").expect("input on search");
        document.dispatch_event(button, "click").expect("click on button");
    });

    assert_eq!(recorder.keys(), vec!["search:query", "cart:add"]);
    assert!(logs.warnings().is_empty());
}
