use std::cell::Cell;

use anyhow::Result;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use super::RecordingRunner;
use crate::runner::CmdOutput;
use crate::secrets::vault::{Vault, VaultItem};
use crate::secrets::{Credential, CredentialRef, DuplicatePolicy, PolicyPrompt, SecretRouter};

/// prompt that always answers the same thing, counting how often it's asked
struct FixedPrompt {
    answer: DuplicatePolicy,
    remember: bool,
    asked: Cell<usize>,
}

impl FixedPrompt {
    fn new(answer: DuplicatePolicy, remember: bool) -> Self {
        FixedPrompt {
            answer,
            remember,
            asked: Cell::new(0),
        }
    }
}

impl PolicyPrompt for FixedPrompt {
    fn choose(&self, _name: &str, _existing: usize) -> Result<(DuplicatePolicy, bool)> {
        self.asked.set(self.asked.get() + 1);
        Ok((self.answer, self.remember))
    }
}

fn vault_credential(name: &str) -> Credential {
    let mut fields = IndexMap::new();
    fields.insert("username".to_string(), "admin".to_string());
    fields.insert("password".to_string(), "hunter2".to_string());
    Credential {
        name: name.to_string(),
        namespace: "default".to_string(),
        fields,
        hostname: Some("app.example.home".to_string()),
        use_vault: true,
    }
}

const ONE_ITEM: &str = r#"[{"id":"item-1","name":"app-admin"}]"#;

#[test]
fn vault_no_action_returns_existing_item_untouched() {
    let runner = RecordingRunner::scripted(vec![CmdOutput::ok(ONE_ITEM)]);
    let vault = Vault::with_session(&runner, "sess", false);
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, false);
    let mut router =
        SecretRouter::new(&runner, Some(&vault), DuplicatePolicy::NoAction, &prompt);

    let reference = router.route(&vault_credential("app-admin")).unwrap();

    assert_eq!(reference, CredentialRef::VaultItem { id: "item-1".to_string() });
    // lookup only; nothing may have been created or deleted
    let lines = runner.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("bw list items"));
}

#[test]
fn vault_duplicate_creates_second_item_and_keeps_original() {
    let runner = RecordingRunner::scripted(vec![
        CmdOutput::ok(ONE_ITEM),
        CmdOutput::ok(r#"{"id":"item-2","name":"app-admin"}"#),
    ]);
    let vault = Vault::with_session(&runner, "sess", false);
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, false);
    let mut router =
        SecretRouter::new(&runner, Some(&vault), DuplicatePolicy::Duplicate, &prompt);

    let reference = router.route(&vault_credential("app-admin")).unwrap();

    assert_eq!(reference, CredentialRef::VaultItem { id: "item-2".to_string() });
    let lines = runner.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("bw create item "));
    assert!(!lines.iter().any(|l| l.contains("delete")));
}

#[test]
fn vault_edit_overwrites_the_single_existing_item() {
    let runner = RecordingRunner::scripted(vec![CmdOutput::ok(ONE_ITEM)]);
    let vault = Vault::with_session(&runner, "sess", false);
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, false);
    let mut router = SecretRouter::new(&runner, Some(&vault), DuplicatePolicy::Edit, &prompt);

    let reference = router.route(&vault_credential("app-admin")).unwrap();

    assert_eq!(reference, CredentialRef::VaultItem { id: "item-1".to_string() });
    assert!(runner.lines()[1].starts_with("bw edit item item-1 "));
    assert_eq!(prompt.asked.get(), 0);
}

#[test]
fn vault_edit_with_several_matches_defers_to_the_prompt() {
    let two_items = r#"[{"id":"item-1","name":"app-admin"},{"id":"item-2","name":"app-admin"}]"#;
    let runner = RecordingRunner::scripted(vec![CmdOutput::ok(two_items)]);
    let vault = Vault::with_session(&runner, "sess", false);
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, false);
    let mut router = SecretRouter::new(&runner, Some(&vault), DuplicatePolicy::Edit, &prompt);

    let reference = router.route(&vault_credential("app-admin")).unwrap();

    // prompt was consulted and its no_action answer won
    assert_eq!(prompt.asked.get(), 1);
    assert_eq!(reference, CredentialRef::VaultItem { id: "item-1".to_string() });
}

#[test]
fn remembered_prompt_answer_is_not_asked_again() {
    let runner = RecordingRunner::scripted(vec![
        CmdOutput::ok(ONE_ITEM),
        CmdOutput::ok(ONE_ITEM),
    ]);
    let vault = Vault::with_session(&runner, "sess", false);
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, true);
    let mut router = SecretRouter::new(&runner, Some(&vault), DuplicatePolicy::Ask, &prompt);

    router.route(&vault_credential("app-admin")).unwrap();
    router.route(&vault_credential("app-admin")).unwrap();

    assert_eq!(prompt.asked.get(), 1);
}

#[test]
fn fresh_vault_item_is_created_without_consulting_policy() {
    let runner = RecordingRunner::scripted(vec![
        CmdOutput::ok("[]"),
        CmdOutput::ok(r#"{"id":"item-9","name":"app-admin"}"#),
    ]);
    let vault = Vault::with_session(&runner, "sess", false);
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, false);
    let mut router = SecretRouter::new(&runner, Some(&vault), DuplicatePolicy::Ask, &prompt);

    let reference = router.route(&vault_credential("app-admin")).unwrap();

    assert_eq!(reference, CredentialRef::VaultItem { id: "item-9".to_string() });
    assert_eq!(prompt.asked.get(), 0);
}

#[test]
fn external_session_is_never_locked() {
    let runner = RecordingRunner::always_ok();
    let mut vault = Vault::with_session(&runner, "from-env", false);

    vault.lock().unwrap();

    // no subprocess at all; the caller's session stays valid
    assert!(runner.lines().is_empty());
}

#[test]
fn owned_session_is_locked_exactly_once() {
    let runner = RecordingRunner::always_ok();
    let mut vault = Vault::with_session(&runner, "ours", true);

    vault.lock().unwrap();
    vault.lock().unwrap();

    let locks: Vec<_> = runner.lines().into_iter().filter(|l| l == "bw lock").collect();
    assert_eq!(locks.len(), 1);
}

#[test]
fn vault_session_rides_along_as_env() {
    let runner = RecordingRunner::scripted(vec![CmdOutput::ok("[]")]);
    let vault = Vault::with_session(&runner, "sess-token", false);

    vault.find_items("anything").unwrap();

    let calls = runner.calls.borrow();
    assert_eq!(calls[0].env.get("BW_SESSION").unwrap(), "sess-token");
    // vault commands never get echoed
    assert!(calls[0].quiet);
}

#[test]
fn native_route_creates_one_secret_and_never_touches_the_vault() {
    let runner = RecordingRunner::always_ok();
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, false);
    let mut router = SecretRouter::new(&runner, None, DuplicatePolicy::Ask, &prompt);

    let mut fields = IndexMap::new();
    fields.insert("username".to_string(), "admin".to_string());
    fields.insert("password".to_string(), "X".to_string());
    let cred = Credential {
        name: "nextcloud-admin".to_string(),
        namespace: "nextcloud".to_string(),
        fields,
        hostname: None,
        use_vault: false,
    };

    let reference = router.route(&cred).unwrap();

    assert_eq!(
        reference,
        CredentialRef::ClusterSecret {
            name: "nextcloud-admin".to_string(),
            namespace: "nextcloud".to_string(),
        }
    );

    let lines = runner.lines();
    let creates: Vec<_> = lines
        .iter()
        .filter(|l| l.starts_with("kubectl apply"))
        .collect();
    assert_eq!(creates.len(), 1);
    assert!(creates[0].ends_with("-n nextcloud"));
    assert!(!lines.iter().any(|l| l.starts_with("bw")));
}

#[test]
fn native_route_no_action_keeps_existing_secret() {
    let runner = RecordingRunner::scripted(vec![
        // namespace create, then a probe that finds the secret
        CmdOutput::ok(""),
        CmdOutput::ok("nextcloud-admin   Opaque   2   4d"),
    ]);
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, false);
    let mut router = SecretRouter::new(&runner, None, DuplicatePolicy::NoAction, &prompt);

    let cred = Credential {
        use_vault: false,
        namespace: "nextcloud".to_string(),
        ..vault_credential("nextcloud-admin")
    };
    router.route(&cred).unwrap();

    assert!(!runner.lines().iter().any(|l| l.starts_with("kubectl apply")));
}

#[test]
fn native_route_duplicate_is_an_error() {
    let runner = RecordingRunner::scripted(vec![
        CmdOutput::ok(""),
        CmdOutput::ok("nextcloud-admin   Opaque   2   4d"),
    ]);
    let prompt = FixedPrompt::new(DuplicatePolicy::NoAction, false);
    let mut router = SecretRouter::new(&runner, None, DuplicatePolicy::Duplicate, &prompt);

    let cred = Credential {
        use_vault: false,
        namespace: "nextcloud".to_string(),
        ..vault_credential("nextcloud-admin")
    };

    assert!(router.route(&cred).is_err());
}

#[test]
fn list_filter_drops_substring_matches() {
    // bw --search matches loosely; only the exact name survives
    let loose = r#"[
        {"id":"item-1","name":"app-admin"},
        {"id":"item-2","name":"app-admin-old"}
    ]"#;
    let runner = RecordingRunner::scripted(vec![CmdOutput::ok(loose)]);
    let vault = Vault::with_session(&runner, "sess", false);

    let items: Vec<VaultItem> = vault.find_items("app-admin").unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "item-1");
}
