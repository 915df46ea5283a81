//! Built-in Binding Catalog
//!
//! The application's default keymap: every shippable binding with its keys,
//! scope, and cheat sheet category. Declaration order here is the dispatch
//! and display tie-break order, so additions go where they belong in the
//! list, not at the end.
//!
//! Conventions baked into the catalog:
//! - Plain-letter bindings (`j`, `?`) never opt into text inputs.
//! - Bindings scoped to regions that are themselves text inputs (search,
//!   form, dialog) must opt in, or they could never fire.
//! - `g>...` is the navigation prefix; new go-to targets extend it.

use tracing::debug;

use crate::registry::{BindingDefinition, Category, Registry};
use crate::scope::Scope;

/// All built-in binding definitions, in declaration order.
pub fn default_catalog() -> Vec<BindingDefinition> {
    let search = Scope::new("search");
    let list = Scope::new("list");
    let dialog = Scope::new("dialog");
    let form = Scope::new("form");

    let catalog = vec![
        // Global actions
        BindingDefinition::new("palette.open", "mod+k", "Open the command palette")
            .category(Category::Actions)
            .allowed_in_text_inputs(),
        BindingDefinition::new("search.focus", "/", "Focus the search box")
            .category(Category::Actions),
        BindingDefinition::new("help.shortcuts", "?", "Show keyboard shortcuts")
            .category(Category::Help),
        // Go-to navigation sequences
        BindingDefinition::new("nav.dashboard", "g>d", "Go to dashboard")
            .category(Category::Navigation),
        BindingDefinition::new("nav.clients", "g>c", "Go to clients")
            .category(Category::Navigation),
        BindingDefinition::new("nav.quotes", "g>q", "Go to quotes")
            .category(Category::Navigation),
        BindingDefinition::new("nav.invoices", "g>i", "Go to invoices")
            .category(Category::Navigation),
        BindingDefinition::new("nav.settings", "g>s", "Go to settings")
            .category(Category::Navigation),
        // View / system
        BindingDefinition::new("view.sidebar", "mod+b", "Toggle the sidebar")
            .category(Category::View),
        BindingDefinition::new("view.density", "mod+shift+d", "Toggle compact density")
            .category(Category::View)
            .disabled_by_default(),
        BindingDefinition::new("app.sync", "mod+shift+u", "Sync data now")
            .category(Category::System),
        // Search box
        BindingDefinition::new("search.clear", "escape", "Clear search and close suggestions")
            .scope(search.clone())
            .category(Category::Actions)
            .allowed_in_text_inputs(),
        BindingDefinition::new("search.submit", "enter", "Run the search")
            .scope(search)
            .category(Category::Actions)
            .allowed_in_text_inputs(),
        // Record lists
        BindingDefinition::new("list.next", "j", "Select the next row")
            .scope(list.clone())
            .category(Category::Navigation),
        BindingDefinition::new("list.prev", "k", "Select the previous row")
            .scope(list.clone())
            .category(Category::Navigation),
        BindingDefinition::new("list.open", "enter", "Open the selected row")
            .scope(list.clone())
            .category(Category::Actions),
        BindingDefinition::new("list.new", "n", "Create a new record")
            .scope(list.clone())
            .category(Category::Actions),
        BindingDefinition::new("list.edit", "e", "Edit the selected record")
            .scope(list.clone())
            .category(Category::Editing),
        BindingDefinition::new("list.archive", "delete", "Archive the selected record")
            .scope(list)
            .category(Category::Editing),
        // Dialogs
        BindingDefinition::new("dialog.close", "escape", "Close the dialog")
            .scope(dialog.clone())
            .category(Category::Actions)
            .allowed_in_text_inputs(),
        BindingDefinition::new("dialog.confirm", "mod+enter", "Confirm the dialog")
            .scope(dialog)
            .category(Category::Actions)
            .allowed_in_text_inputs(),
        // Forms
        BindingDefinition::new("form.save", "mod+s", "Save the form")
            .scope(form.clone())
            .category(Category::Editing)
            .allowed_in_text_inputs(),
        BindingDefinition::new("form.save-close", "mod+shift+s", "Save and close")
            .scope(form.clone())
            .category(Category::Editing)
            .allowed_in_text_inputs(),
        BindingDefinition::new("form.discard", "escape", "Discard changes")
            .scope(form)
            .category(Category::Editing)
            .allowed_in_text_inputs(),
    ];

    debug!(count = catalog.len(), "Built-in binding catalog loaded");
    catalog
}

/// The default catalog as a ready [`Registry`].
///
/// # Panics
///
/// Panics if the catalog declares a duplicate id, which is a programming
/// error caught by the tests below.
pub fn default_registry() -> Registry {
    match Registry::new(default_catalog()) {
        Ok(registry) => registry,
        Err(error) => panic!("builtin catalog is invalid: {error}"),
    }
}
