use formsync_control::Control;
use formsync_control::validators::required;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use crate::manager::{StoreAction, write_form};
use crate::{FormsManager, ManagerConfig, UpsertOptions};

fn login() -> Control {
	Control::group([
		("email", Control::leaf(Value::Null).with_validators([required()])),
		("password", Control::leaf("")),
	])
}

#[test]
fn action_labels_capitalize_the_form_name() {
	assert_eq!(StoreAction::Create.label("config"), "Create Config Form");
	assert_eq!(StoreAction::Update.label("userProfile"), "Update UserProfile Form");
	assert_eq!(StoreAction::Update.label(""), "Update  Form");
}

#[test]
fn write_form_replaces_only_its_own_entry() {
	let manager = FormsManager::new();
	let store = manager.store();
	write_form(store, "a", &Control::leaf(1), StoreAction::Create);
	write_form(store, "b", &Control::leaf(2), StoreAction::Create);
	let before = manager.state();

	write_form(store, "b", &Control::leaf(3), StoreAction::Update);
	let after = manager.state();

	assert!(matches!((&before["a"], &after["a"]), (Some(x), Some(y)) if std::sync::Arc::ptr_eq(x, y)));
	assert_eq!(after["b"].as_ref().map(|s| s.value.clone()), Some(json!(3)));
}

#[test]
fn upsert_outside_a_runtime_uses_the_fallback() {
	let _ = tracing_subscriber::fmt::try_init();
	let manager = FormsManager::new();
	let form = login();
	manager.upsert("login", &form, UpsertOptions::new()).expect("no lists to rebuild");

	assert!(manager.has_form("login"));
	assert!(manager.is_subscribed("login"));
	assert_eq!(manager.get_control("login", Some("email")).map(|c| c.valid), Some(false));
	assert!(manager.get_ng_form("login").is_some_and(|c| c.ptr_eq(&form)));

	manager.unsubscribe(None);
	assert!(!manager.is_subscribed("login"));
}

#[test]
fn reads_on_unknown_names_are_empty() {
	let manager = FormsManager::new();
	assert!(!manager.has_form("missing"));
	assert!(manager.get_form("missing").is_none());
	assert!(manager.get_control("missing", Some("a.b")).is_none());
	assert!(manager.get_ng_form("missing").is_none());
	assert!(manager.get_value_as::<String>("missing", None).is_none());

	manager.remove("missing");
	manager.unsubscribe(Some("missing"));
	assert!(manager.state().is_empty());
}

#[test]
fn empty_path_reads_the_whole_form() {
	let manager = FormsManager::new();
	manager.upsert("login", &login(), UpsertOptions::new()).expect("no lists to rebuild");
	assert_eq!(manager.get_control("login", Some("")), manager.get_control("login", None));
	assert_eq!(manager.get_control("login", Some("nope")), None);
	manager.unsubscribe(None);
}

#[test]
fn get_value_as_decodes_and_rejects_mismatches() {
	let manager = FormsManager::new();
	let form = Control::group([("count", Control::leaf(3)), ("label", Control::leaf("x"))]);
	manager.upsert("counter", &form, UpsertOptions::new()).expect("no lists to rebuild");

	assert_eq!(manager.get_value_as::<u32>("counter", Some("count")), Some(3));
	assert_eq!(manager.get_value_as::<u32>("counter", Some("label")), None);
	manager.unsubscribe(None);
}

#[test]
fn config_defaults_flow_into_the_manager() {
	let config = ManagerConfig::from_toml_str("debounce-ms = 25").expect("config parses");
	let manager = FormsManager::with_config(config.clone());
	assert_eq!(manager.config(), &config);
	assert_eq!(FormsManager::default().config(), &ManagerConfig::default());
}
