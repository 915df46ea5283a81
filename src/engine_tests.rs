//! End-to-end tests for the engine facade: key events through dispatch,
//! scope gating, customization edits, and persistence. The platform is
//! pinned to Linux so `mod` means ctrl everywhere in here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use crate::config::EngineConfig;
use crate::conflict::ConflictKind;
use crate::engine::{Engine, Handled};
use crate::keys::{Platform, RawKeyEvent};
use crate::registry::{BindingDefinition, Category, Registry};
use crate::scope::Scope;
use crate::store::JsonFileStore;

fn registry() -> Registry {
    Registry::new(vec![
        BindingDefinition::new("palette.open", "mod+k", "Open the command palette")
            .allowed_in_text_inputs(),
        BindingDefinition::new("nav.dashboard", "g>d", "Go to dashboard")
            .category(Category::Navigation),
        BindingDefinition::new("help.shortcuts", "?", "Show keyboard shortcuts")
            .category(Category::Help),
        BindingDefinition::new("list.next", "j", "Next item")
            .scope(Scope::new("list"))
            .category(Category::Navigation),
        BindingDefinition::new("list.open", "enter", "Open selected item")
            .scope(Scope::new("list")),
        BindingDefinition::new("dialog.confirm", "enter", "Confirm dialog")
            .scope(Scope::new("dialog")),
    ])
    .unwrap()
}

fn engine() -> Engine {
    Engine::new(registry(), EngineConfig::with_platform(Platform::Linux))
}

fn press(key: &str) -> RawKeyEvent {
    RawKeyEvent::new(key)
}

fn ctrl(key: &str) -> RawKeyEvent {
    RawKeyEvent {
        key: key.into(),
        ctrl: true,
        ..Default::default()
    }
}

/// Bind a counting handler and hand back its counter.
fn count_calls(engine: &Engine, id: &str) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    engine.bind_action(id, move |_event| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    count
}

fn dispatched_id(handled: Handled) -> String {
    match handled {
        Handled::Dispatched(id) => id.as_str().to_string(),
        other => panic!("expected dispatch, got {other:?}"),
    }
}

#[test]
fn chord_dispatches_to_bound_handler() {
    let mut engine = engine();
    let calls = count_calls(&engine, "palette.open");

    let handled = engine.key_event(&ctrl("k"), Instant::now());
    assert_eq!(dispatched_id(handled.clone()), "palette.open");
    assert!(handled.is_consumed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn unbound_key_is_not_handled() {
    let mut engine = engine();
    let handled = engine.key_event(&press("z"), Instant::now());
    assert_eq!(handled, Handled::NotHandled);
    assert!(!handled.is_consumed());
}

#[test]
fn dispatch_without_handler_still_consumes_the_event() {
    let mut engine = engine();
    let handled = engine.key_event(&ctrl("k"), Instant::now());
    assert_eq!(dispatched_id(handled), "palette.open");
}

#[test]
fn regional_bindings_need_their_scope() {
    let mut engine = engine();
    let calls = count_calls(&engine, "list.next");

    assert_eq!(engine.key_event(&press("j"), Instant::now()), Handled::NotHandled);

    let token = engine.enter_scope("list");
    assert_eq!(
        dispatched_id(engine.key_event(&press("j"), Instant::now())),
        "list.next"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    engine.leave_scope(token);
    assert_eq!(engine.key_event(&press("j"), Instant::now()), Handled::NotHandled);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn most_recent_scope_wins_shared_keys() {
    let mut engine = engine();
    let list_calls = count_calls(&engine, "list.open");
    let dialog_calls = count_calls(&engine, "dialog.confirm");

    engine.enter_scope("list");
    let dialog = engine.enter_scope("dialog");

    assert_eq!(
        dispatched_id(engine.key_event(&press("enter"), Instant::now())),
        "dialog.confirm"
    );
    assert_eq!(dialog_calls.load(Ordering::SeqCst), 1);
    assert_eq!(list_calls.load(Ordering::SeqCst), 0);

    // Dialog closes; the same key now belongs to the list again.
    engine.leave_scope(dialog);
    assert_eq!(
        dispatched_id(engine.key_event(&press("enter"), Instant::now())),
        "list.open"
    );
    assert_eq!(list_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn regional_binding_beats_global_on_same_keys() {
    let registry = Registry::new(vec![
        BindingDefinition::new("app.next", "j", "Next anywhere"),
        BindingDefinition::new("list.next", "j", "Next in list").scope(Scope::new("list")),
    ])
    .unwrap();
    let mut engine = Engine::new(registry, EngineConfig::with_platform(Platform::Linux));

    assert_eq!(
        dispatched_id(engine.key_event(&press("j"), Instant::now())),
        "app.next"
    );

    engine.enter_scope("list");
    assert_eq!(
        dispatched_id(engine.key_event(&press("j"), Instant::now())),
        "list.next"
    );
}

#[test]
fn same_scope_tie_falls_back_to_registration_order() {
    let registry = Registry::new(vec![
        BindingDefinition::new("first.action", "mod+k", "First"),
        BindingDefinition::new("second.action", "mod+k", "Second"),
    ])
    .unwrap();
    let mut engine = Engine::new(registry, EngineConfig::with_platform(Platform::Linux));

    assert_eq!(
        dispatched_id(engine.key_event(&ctrl("k"), Instant::now())),
        "first.action"
    );
}

#[test]
fn sequence_goes_pending_then_dispatches() {
    let mut engine = engine();
    let calls = count_calls(&engine, "nav.dashboard");
    let t0 = Instant::now();

    let handled = engine.key_event(&press("g"), t0);
    assert_eq!(handled, Handled::Pending { deadline: t0 + Duration::from_millis(1000) });
    assert!(handled.is_consumed());
    assert_eq!(engine.pending_keys().as_deref(), Some("g"));
    assert_eq!(engine.pending_deadline(), Some(t0 + Duration::from_millis(1000)));

    assert_eq!(
        dispatched_id(engine.key_event(&press("d"), t0 + Duration::from_millis(300))),
        "nav.dashboard"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.pending_keys(), None);
}

#[test]
fn sequence_timeout_expires_the_prefix() {
    let mut engine = engine();
    let t0 = Instant::now();

    engine.key_event(&press("g"), t0);
    assert!(engine.on_timeout(t0 + Duration::from_millis(1000)));
    assert_eq!(engine.pending_deadline(), None);

    // After expiry the second key means nothing.
    assert_eq!(
        engine.key_event(&press("d"), t0 + Duration::from_millis(1100)),
        Handled::NotHandled
    );
}

#[test]
fn leaving_a_scope_abandons_its_pending_sequence() {
    let registry = Registry::new(vec![BindingDefinition::new("list.goto", "g>d", "Go to")
        .scope(Scope::new("list"))])
    .unwrap();
    let mut engine = Engine::new(registry, EngineConfig::with_platform(Platform::Linux));

    let token = engine.enter_scope("list");
    let handled = engine.key_event(&press("g"), Instant::now());
    assert!(matches!(handled, Handled::Pending { .. }));

    engine.leave_scope(token);
    assert_eq!(engine.pending_keys(), None, "prefix died with its scope");
}

#[test]
fn text_input_events_only_reach_allowed_bindings() {
    let mut engine = engine();
    let in_input = RawKeyEvent {
        key: "?".into(),
        shift: true,
        in_text_input: true,
        ..Default::default()
    };
    assert_eq!(
        engine.key_event(&in_input, Instant::now()),
        Handled::NotHandled,
        "typing ? into a field is just typing"
    );

    let palette = RawKeyEvent {
        key: "k".into(),
        ctrl: true,
        in_text_input: true,
        ..Default::default()
    };
    assert_eq!(
        dispatched_id(engine.key_event(&palette, Instant::now())),
        "palette.open"
    );
}

#[test]
fn layout_symbol_matches_with_and_without_shift() {
    let mut engine = engine();

    let with_shift = RawKeyEvent {
        key: "?".into(),
        shift: true,
        ..Default::default()
    };
    assert_eq!(
        dispatched_id(engine.key_event(&with_shift, Instant::now())),
        "help.shortcuts"
    );
    assert_eq!(
        dispatched_id(engine.key_event(&press("?"), Instant::now())),
        "help.shortcuts"
    );
}

#[test]
fn customization_redirects_dispatch_immediately() {
    let mut engine = engine();
    let calls = count_calls(&engine, "palette.open");

    let conflicts = engine.set_customization("palette.open", "mod+p").unwrap();
    assert!(conflicts.is_empty());

    assert_eq!(engine.key_event(&ctrl("k"), Instant::now()), Handled::NotHandled);
    assert_eq!(
        dispatched_id(engine.key_event(&ctrl("p"), Instant::now())),
        "palette.open"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let palette = engine.resolved_binding("palette.open").unwrap();
    assert!(palette.is_customized);
    assert_eq!(palette.effective_keys_text(), "mod+p");
}

#[test]
fn invalid_customization_is_rejected_without_side_effects() {
    let mut engine = engine();
    assert!(engine.set_customization("palette.open", "mod+bogus").is_err());

    let palette = engine.resolved_binding("palette.open").unwrap();
    assert!(!palette.is_customized);
    assert_eq!(palette.effective_keys_text(), "mod+k");
    assert!(engine.customizations().is_empty());
}

#[test]
fn reset_keys_restores_the_default() {
    let mut engine = engine();
    engine.set_customization("palette.open", "mod+p").unwrap();
    engine.reset_keys("palette.open");

    let palette = engine.resolved_binding("palette.open").unwrap();
    assert_eq!(palette.effective_keys_text(), "mod+k");
    assert!(!palette.is_customized);
}

#[test]
fn disabling_a_binding_suppresses_dispatch() {
    let mut engine = engine();
    let calls = count_calls(&engine, "palette.open");

    engine.set_enabled("palette.open", Some(false));
    assert_eq!(engine.key_event(&ctrl("k"), Instant::now()), Handled::NotHandled);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Clearing the override restores the definition default.
    engine.set_enabled("palette.open", None);
    assert_eq!(
        dispatched_id(engine.key_event(&ctrl("k"), Instant::now())),
        "palette.open"
    );
}

#[test]
fn disabling_a_scope_mutes_its_bindings() {
    let mut engine = engine();
    engine.enter_scope("list");

    engine.set_scope_disabled("list", true);
    assert_eq!(engine.key_event(&press("j"), Instant::now()), Handled::NotHandled);

    engine.set_scope_disabled("list", false);
    assert_eq!(
        dispatched_id(engine.key_event(&press("j"), Instant::now())),
        "list.next"
    );
}

#[test]
fn edits_report_resulting_conflicts() {
    let mut engine = engine();

    // Move a list binding onto the global palette chord.
    let conflicts = engine.set_customization("list.next", "mod+k").unwrap();
    let duplicate = conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::DuplicateKeys)
        .expect("edit should report the duplicate");
    assert_eq!(duplicate.keys, "mod+k");
    assert!(duplicate
        .binding_ids
        .iter()
        .any(|id| id.as_str() == "list.next"));

    // Undoing the edit clears it.
    let conflicts = engine.clear_customization("list.next");
    assert!(conflicts.is_empty());
}

#[test]
fn reserved_collision_comes_back_as_advisory_conflict() {
    let mut engine = engine();
    let conflicts = engine.set_customization("palette.open", "mod+w").unwrap();
    let reserved = conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::Reserved)
        .expect("mod+w is host-reserved");
    assert_eq!(reserved.reserved_label.as_deref(), Some("Close tab"));
}

#[test]
fn reset_all_wipes_customizations() {
    let mut engine = engine();
    engine.set_customization("palette.open", "mod+p").unwrap();
    engine.set_enabled("list.next", Some(false));
    engine.set_scope_disabled("dialog", true);

    engine.reset_all();
    assert!(engine.customizations().is_empty());
    assert_eq!(
        engine
            .resolved_binding("palette.open")
            .unwrap()
            .effective_keys_text(),
        "mod+k"
    );
}

#[test]
fn customization_edit_retargets_pending_sequence() {
    let mut engine = engine();
    let t0 = Instant::now();

    engine.key_event(&press("g"), t0);
    assert!(engine.pending_keys().is_some());

    // The only g>... binding moves away, so the prefix has no future.
    engine.set_customization("nav.dashboard", "mod+1").unwrap();
    assert_eq!(engine.pending_keys(), None);
}

#[test]
fn unbind_stops_invocations_but_binding_still_fires() {
    let mut engine = engine();
    let calls = count_calls(&engine, "palette.open");

    engine.key_event(&ctrl("k"), Instant::now());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    engine.unbind("palette.open");
    assert_eq!(
        dispatched_id(engine.key_event(&ctrl("k"), Instant::now())),
        "palette.open"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1, "handler is gone");
}

#[test]
fn panicking_handler_leaves_the_engine_usable() {
    let mut engine = engine();
    engine.bind_action("palette.open", |_event| panic!("action bug"));
    let calls = count_calls(&engine, "list.next");

    // The press still counts as dispatched; the panic stays inside dispatch.
    assert_eq!(
        dispatched_id(engine.key_event(&ctrl("k"), Instant::now())),
        "palette.open"
    );

    // And the engine keeps taking input afterwards.
    engine.enter_scope("list");
    assert_eq!(
        dispatched_id(engine.key_event(&press("j"), Instant::now())),
        "list.next"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn handler_receives_effective_keys_and_scope() {
    let mut engine = engine();
    let seen: Arc<parking_lot::Mutex<Vec<(String, String)>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    engine.bind_action("list.next", move |event| {
        sink.lock()
            .push((event.keys.clone(), event.scope.as_str().to_string()));
    });

    engine.enter_scope("list");
    engine.key_event(&press("j"), Instant::now());

    let events = seen.lock();
    assert_eq!(events.as_slice(), &[("j".to_string(), "list".to_string())]);
}

#[test]
fn edits_persist_across_engine_restarts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("customizations.json");

    {
        let mut engine = Engine::with_store(
            registry(),
            EngineConfig::with_platform(Platform::Linux),
            JsonFileStore::new(&path),
        );
        engine.set_customization("palette.open", "mod+p").unwrap();
        engine.set_enabled("list.next", Some(false));
        // Dropping the engine joins the background writer, flushing the save.
    }

    let engine = Engine::with_store(
        registry(),
        EngineConfig::with_platform(Platform::Linux),
        JsonFileStore::new(&path),
    );
    let palette = engine.resolved_binding("palette.open").unwrap();
    assert_eq!(palette.effective_keys_text(), "mod+p");
    assert!(palette.is_customized);
    assert!(!engine.resolved_binding("list.next").unwrap().is_enabled);
}

#[test]
fn broken_customization_file_degrades_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("customizations.json");
    std::fs::write(&path, "{broken").unwrap();

    let engine = Engine::with_store(
        registry(),
        EngineConfig::with_platform(Platform::Linux),
        JsonFileStore::new(&path),
    );
    assert!(engine.customizations().is_empty());
    assert_eq!(
        engine
            .resolved_binding("palette.open")
            .unwrap()
            .effective_keys_text(),
        "mod+k"
    );
}

#[test]
fn cheat_sheet_puts_global_first_and_groups_by_category() {
    let engine = engine();
    let sheet = engine.cheat_sheet();

    assert!(sheet[0].scope.is_global());
    let global_categories: Vec<Category> =
        sheet[0].categories.iter().map(|(c, _)| *c).collect();
    assert_eq!(
        global_categories,
        vec![Category::Navigation, Category::Actions, Category::Help],
        "categories follow the fixed display order"
    );

    let scopes: Vec<&str> = sheet.iter().map(|s| s.scope.as_str()).collect();
    assert_eq!(scopes, ["global", "list", "dialog"]);
}

#[test]
fn cheat_sheet_includes_disabled_bindings() {
    let mut engine = engine();
    engine.set_enabled("palette.open", Some(false));

    let sheet = engine.cheat_sheet();
    let palette = sheet[0]
        .categories
        .iter()
        .flat_map(|(_, bindings)| bindings)
        .find(|b| b.id.as_str() == "palette.open")
        .expect("disabled bindings still listed");
    assert!(!palette.is_enabled);
}

#[test]
fn format_keys_uses_engine_platform() {
    let engine = engine();
    assert_eq!(engine.format_keys("mod+shift+k"), "Ctrl+Shift+K");
    assert_eq!(engine.format_keys("g>d"), "G then D");

    let mac = Engine::new(registry(), EngineConfig::with_platform(Platform::MacOs));
    assert_eq!(mac.format_keys("mod+shift+k"), "⌘⇧K");
    assert_eq!(mac.format_keys("g>d"), "G D");
}
