use az_cli_runner::ScriptedRunner;
use chrono::{TimeZone, Utc};
use keyvault_ops::{
    AttributesUpdate, CertificateCreateInput, CertificateEncoding, CertificateImportInput,
    KeyCreateInput, KeyCurve, KeyType, KeyVaultClient, KeyVaultError, ResourceStatus,
    SecretSetInput, VaultCreateInput,
};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

fn client() -> (Arc<ScriptedRunner>, KeyVaultClient) {
    let runner = Arc::new(ScriptedRunner::new());
    let client = KeyVaultClient::new(runner.clone());
    (runner, client)
}

const SECRET_LIST: &str = r#"[
  {
    "attributes": {"created": "2024-01-15T10:30:00+00:00", "enabled": true,
                   "expires": null, "notBefore": null, "recoveryLevel": "Recoverable+Purgeable",
                   "updated": "2024-01-15T10:30:00+00:00"},
    "contentType": "text/plain",
    "id": "https://team-kv.vault.azure.net/secrets/db-password",
    "managed": null,
    "name": "db-password",
    "tags": {"env": "prod"}
  },
  {
    "attributes": {"enabled": false, "created": 1705314600},
    "id": "https://team-kv.vault.azure.net/secrets/old-token",
    "name": "old-token",
    "tags": null
  }
]"#;

#[tokio::test]
async fn secret_list_decodes_records_and_status() {
    let (runner, client) = client();
    runner.respond_json(&["keyvault", "secret", "list"], SECRET_LIST);

    let secrets = client.secrets.list("team-kv").await.unwrap();

    assert_eq!(secrets.len(), 2);
    assert_eq!(secrets[0].name, "db-password");
    assert_eq!(secrets[0].content_type.as_deref(), Some("text/plain"));
    assert_eq!(secrets[0].status(), ResourceStatus::Active);
    assert_eq!(
        secrets[0].attributes.recovery_level.as_deref(),
        Some("Recoverable+Purgeable")
    );
    assert_eq!(secrets[1].status(), ResourceStatus::Disabled);
    assert_eq!(
        secrets[1].attributes.created,
        Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
    );

    let call = runner.last_call().unwrap();
    assert_eq!(
        call.command_line(),
        "az 'keyvault' 'secret' 'list' '--vault-name' 'team-kv' '-o' 'json'"
    );
}

#[tokio::test]
async fn secret_show_returns_value_for_version() {
    let (runner, client) = client();
    runner.respond_json(
        &["keyvault", "secret", "show"],
        r#"{"id": "https://team-kv.vault.azure.net/secrets/api-key/7c1d", "value": "abc123",
            "attributes": {"enabled": true}}"#,
    );

    let secret = client
        .secrets
        .show("team-kv", "api-key", Some("7c1d"))
        .await
        .unwrap();

    assert_eq!(secret.value.as_deref(), Some("abc123"));
    assert_eq!(secret.version.as_deref(), Some("7c1d"));
    assert_eq!(runner.last_call().unwrap().value_of("--version"), Some("7c1d"));
}

#[tokio::test]
async fn secret_set_masks_value_and_renders_options() {
    let (runner, client) = client();
    runner.respond_json(
        &["keyvault", "secret", "set"],
        r#"{"id": "https://team-kv.vault.azure.net/secrets/db-password/v2",
            "value": "hunter2", "attributes": {"enabled": true}}"#,
    );

    let input = SecretSetInput {
        vault: "team-kv".into(),
        name: "db-password".into(),
        value: "hunter2".into(),
        content_type: Some("text/plain".into()),
        enabled: Some(false),
        expires: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
        not_before: None,
        tags: HashMap::from([
            ("owner".to_string(), "ops".to_string()),
            ("env".to_string(), "prod".to_string()),
        ]),
    };
    let secret = client.secrets.set(&input).await.unwrap();

    assert_eq!(secret.version.as_deref(), Some("v2"));
    assert!(secret.value.is_none());

    let call = runner.last_call().unwrap();
    assert_eq!(call.value_of("--value"), Some("hunter2"));
    assert_eq!(call.value_of("--disabled"), Some("true"));
    assert_eq!(call.value_of("--expires"), Some("2030-01-01T00:00:00Z"));
    let argv = call.argv();
    let tags_at = argv.iter().position(|a| a == "--tags").unwrap();
    assert_eq!(&argv[tags_at + 1..tags_at + 3], ["env=prod", "owner=ops"]);
    assert!(!call.redacted_line().contains("hunter2"));
    assert!(!call.to_string().contains("hunter2"));
}

#[tokio::test]
async fn secret_set_rejects_oversized_value_without_running() {
    let (runner, client) = client();
    let input = SecretSetInput {
        vault: "team-kv".into(),
        name: "big".into(),
        value: "x".repeat(25 * 1024 + 1),
        ..Default::default()
    };

    let err = client.secrets.set(&input).await.unwrap_err();

    assert_eq!(err.code(), "validation");
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn invalid_names_never_reach_the_cli() {
    let (runner, client) = client();

    let errors = vec![
        client.secrets.list("x").await.unwrap_err(),
        client.secrets.show("team-kv", "bad_name", None).await.unwrap_err(),
        client.secrets.delete("team-kv", "").await.unwrap_err(),
        client.secrets.purge("1vault", "ok").await.unwrap_err(),
        client.keys.show("team-kv", "has space", None).await.unwrap_err(),
        client.keys.delete("my--vault", "k").await.unwrap_err(),
        client
            .certificates
            .show("team-kv", &"c".repeat(128), None)
            .await
            .unwrap_err(),
        client.vaults.show("kv", None).await.unwrap_err(),
        client.vaults.list(Some("ends.")).await.unwrap_err(),
    ];

    for err in errors {
        assert!(matches!(err, KeyVaultError::Validation(_)), "{err:?}");
        assert!(!err.message().is_empty());
    }
    assert_eq!(runner.call_count(), 0);
}

async fn fails_once<T, Fut>(op: impl FnOnce(KeyVaultClient) -> Fut)
where
    T: std::fmt::Debug,
    Fut: Future<Output = Result<T, KeyVaultError>>,
{
    let (runner, client) = client();
    for root in ["keyvault", "account", "ad", "role"] {
        runner.fail(&[root], "ERROR: upstream exploded");
    }

    let err = op(client).await.unwrap_err();

    assert!(err.message().contains("upstream exploded"), "{err:?}");
    assert_eq!(err.code(), "command_failed");
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn every_operation_surfaces_cli_failure_after_one_command() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("bundle.pem");
    std::fs::write(&file, "-----BEGIN CERTIFICATE-----\n").unwrap();

    fails_once(|c| async move { c.vaults.list(None).await }).await;
    fails_once(|c| async move { c.vaults.show("team-kv", Some("rg")).await }).await;
    fails_once(|c| async move {
        c.vaults
            .create(&VaultCreateInput {
                name: "team-kv".into(),
                resource_group: "rg".into(),
                location: "westeurope".into(),
                ..Default::default()
            })
            .await
    })
    .await;
    fails_once(|c| async move { c.vaults.delete("team-kv", None).await }).await;

    fails_once(|c| async move { c.secrets.list("team-kv").await }).await;
    fails_once(|c| async move { c.secrets.list_versions("team-kv", "s").await }).await;
    fails_once(|c| async move { c.secrets.show("team-kv", "s", None).await }).await;
    fails_once(|c| async move {
        c.secrets
            .set(&SecretSetInput {
                vault: "team-kv".into(),
                name: "s".into(),
                value: "v".into(),
                ..Default::default()
            })
            .await
    })
    .await;
    fails_once(|c| async move {
        let update = AttributesUpdate {
            enabled: Some(false),
            ..Default::default()
        };
        c.secrets.set_attributes("team-kv", "s", &update).await
    })
    .await;
    fails_once(|c| async move { c.secrets.delete("team-kv", "s").await }).await;
    fails_once(|c| async move { c.secrets.recover("team-kv", "s").await }).await;
    fails_once(|c| async move { c.secrets.purge("team-kv", "s").await }).await;
    fails_once(|c| async move { c.secrets.list_deleted("team-kv").await }).await;

    fails_once(|c| async move { c.keys.list("team-kv").await }).await;
    fails_once(|c| async move { c.keys.list_versions("team-kv", "k").await }).await;
    fails_once(|c| async move { c.keys.show("team-kv", "k", None).await }).await;
    fails_once(|c| async move {
        c.keys
            .create(&KeyCreateInput {
                vault: "team-kv".into(),
                name: "k".into(),
                ..Default::default()
            })
            .await
    })
    .await;
    fails_once(|c| async move {
        let update = AttributesUpdate {
            key_ops: Some(vec!["sign".into()]),
            ..Default::default()
        };
        c.keys.set_attributes("team-kv", "k", &update).await
    })
    .await;
    fails_once(|c| async move { c.keys.delete("team-kv", "k").await }).await;
    fails_once(|c| async move { c.keys.recover("team-kv", "k").await }).await;
    fails_once(|c| async move { c.keys.purge("team-kv", "k").await }).await;
    fails_once(|c| async move { c.keys.list_deleted("team-kv").await }).await;
    let backup = dir.path().join("k.backup");
    fails_once(|c| async move { c.keys.backup("team-kv", "k", &backup).await }).await;
    let restore = file.clone();
    fails_once(|c| async move { c.keys.restore("team-kv", &restore).await }).await;

    fails_once(|c| async move { c.certificates.list("team-kv").await }).await;
    fails_once(|c| async move { c.certificates.show("team-kv", "c", None).await }).await;
    fails_once(|c| async move { c.certificates.get_default_policy().await }).await;
    fails_once(|c| async move {
        c.certificates
            .create(&CertificateCreateInput {
                vault: "team-kv".into(),
                name: "c".into(),
                policy: Some(serde_json::json!({"issuerParameters": {"name": "Self"}})),
                ..Default::default()
            })
            .await
    })
    .await;
    fails_once(|c| async move {
        let update = AttributesUpdate {
            tags: Some(HashMap::from([("env".into(), "dev".into())])),
            ..Default::default()
        };
        c.certificates.set_attributes("team-kv", "c", &update).await
    })
    .await;
    fails_once(|c| async move { c.certificates.delete("team-kv", "c").await }).await;
    let import = file.clone();
    fails_once(|c| async move {
        c.certificates
            .import(&CertificateImportInput {
                vault: "team-kv".into(),
                name: "c".into(),
                file: import,
                password: Some("pfx-pass".into()),
                ..Default::default()
            })
            .await
    })
    .await;
    let download = dir.path().join("c.pem");
    fails_once(|c| async move {
        c.certificates
            .download("team-kv", "c", &download, CertificateEncoding::Pem, None)
            .await
    })
    .await;
    fails_once(|c| async move { c.certificates.list_deleted("team-kv").await }).await;
    fails_once(|c| async move { c.certificates.recover("team-kv", "c").await }).await;
    fails_once(|c| async move { c.certificates.purge("team-kv", "c").await }).await;

    fails_once(|c| async move { c.account.show().await }).await;
    fails_once(|c| async move { c.account.list().await }).await;
    fails_once(|c| async move { c.account.set_subscription("dev-sub").await }).await;
    fails_once(|c| async move { c.account.signed_in_user().await }).await;
    fails_once(|c| async move { c.account.role_assignments("user-1", None).await }).await;
}

#[tokio::test]
async fn failures_are_classified_from_stderr() {
    let (runner, client) = client();
    runner.fail(
        &["keyvault", "secret", "show"],
        "ERROR: (SecretNotFound) A secret with (name/id) missing was not found in this key vault.",
    );
    runner.fail(
        &["keyvault", "secret", "list"],
        "ERROR: Please run 'az login' to setup account.",
    );

    let err = client.secrets.show("team-kv", "missing", None).await.unwrap_err();
    assert!(matches!(err, KeyVaultError::NotFound { .. }));

    let err = client.secrets.list("team-kv").await.unwrap_err();
    assert!(matches!(err, KeyVaultError::NotLoggedIn { .. }));
}

#[tokio::test]
async fn unparseable_output_is_a_parse_error() {
    let (runner, client) = client();
    runner.respond_json(&["keyvault", "key", "show"], "WARNING: this is not json");

    let err = client.keys.show("team-kv", "k", None).await.unwrap_err();

    assert_eq!(err.code(), "parse_error");
}

#[tokio::test]
async fn key_create_defaults_rsa_size_and_checks_curve() {
    let (runner, client) = client();
    runner.respond_json(
        &["keyvault", "key", "create"],
        r#"{"key": {"kid": "https://team-kv.vault.azure.net/keys/signing/v1", "kty": "RSA",
                    "keyOps": ["sign"]},
            "attributes": {"enabled": true}}"#,
    );

    let key = client
        .keys
        .create(&KeyCreateInput {
            vault: "team-kv".into(),
            name: "signing".into(),
            ops: vec!["sign".into(), "verify".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(key.name, "signing");

    let call = runner.last_call().unwrap();
    assert_eq!(call.value_of("--kty"), Some("RSA"));
    assert_eq!(call.value_of("--size"), Some("2048"));
    assert_eq!(call.value_of("--ops"), Some("sign"));
    assert!(call.value_of("--curve").is_none());

    let err = client
        .keys
        .create(&KeyCreateInput {
            vault: "team-kv".into(),
            name: "ec".into(),
            key_type: KeyType::Ec,
            size: Some(2048),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    let err = client
        .keys
        .create(&KeyCreateInput {
            vault: "team-kv".into(),
            name: "rsa".into(),
            curve: Some(KeyCurve::P256),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    let err = client
        .keys
        .create(&KeyCreateInput {
            vault: "team-kv".into(),
            name: "rsa".into(),
            size: Some(1024),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn key_restore_requires_existing_file() {
    let (runner, client) = client();
    let missing = PathBuf::from("/definitely/not/here.backup");

    let err = client.keys.restore("team-kv", &missing).await.unwrap_err();

    assert_eq!(err.code(), "validation");
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn certificate_create_without_policy_fetches_default_first() {
    let (runner, client) = client();
    runner.respond_json(
        &["keyvault", "certificate", "get-default-policy"],
        r#"{"issuerParameters": {"name": "Self"},
            "x509CertificateProperties": {"subject": "CN=CLIGetDefaultPolicy"}}"#,
    );
    runner.respond_json(
        &["keyvault", "certificate", "create"],
        r#"{"id": "https://team-kv.vault.azure.net/certificates/web/pending",
            "status": "completed", "statusDetails": null, "target": null}"#,
    );

    let operation = client
        .certificates
        .create(&CertificateCreateInput {
            vault: "team-kv".into(),
            name: "web".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(operation.is_completed());
    assert_eq!(runner.call_count(), 2);
    let calls = runner.calls();
    assert!(calls[0].starts_with(&["keyvault", "certificate", "get-default-policy"]));
    let policy: serde_json::Value =
        serde_json::from_str(calls[1].value_of("--policy").unwrap()).unwrap();
    assert_eq!(policy["issuerParameters"]["name"], "Self");
}

#[tokio::test]
async fn certificate_import_masks_password() {
    let (runner, client) = client();
    let file = tempfile::NamedTempFile::new().unwrap();
    runner.respond_json(
        &["keyvault", "certificate", "import"],
        r#"{"id": "https://team-kv.vault.azure.net/certificates/web/v1",
            "x509ThumbprintHex": "0A1B", "attributes": {"enabled": true}}"#,
    );

    let cert = client
        .certificates
        .import(&CertificateImportInput {
            vault: "team-kv".into(),
            name: "web".into(),
            file: file.path().to_path_buf(),
            password: Some("pfx-secret".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(cert.thumbprint.as_deref(), Some("0A1B"));
    let call = runner.last_call().unwrap();
    assert_eq!(call.value_of("--password"), Some("pfx-secret"));
    assert!(!call.redacted_line().contains("pfx-secret"));
}

#[tokio::test]
async fn certificate_set_attributes_rejects_validity_changes() {
    let (runner, client) = client();
    let update = AttributesUpdate {
        expires: Some(Utc::now()),
        ..Default::default()
    };

    let err = client
        .certificates
        .set_attributes("team-kv", "web", &update)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "validation");
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn delete_returns_recovery_details() {
    let (runner, client) = client();
    runner.respond_json(
        &["keyvault", "secret", "delete"],
        r#"{"id": "https://team-kv.vault.azure.net/secrets/db-password/v2",
            "recoveryId": "https://team-kv.vault.azure.net/deletedsecrets/db-password",
            "deletedDate": "2024-03-01T08:00:00+00:00",
            "scheduledPurgeDate": "2024-05-30T08:00:00+00:00",
            "attributes": {"enabled": true, "recoverableDays": 90}}"#,
    );

    let deleted = client.secrets.delete("team-kv", "db-password").await.unwrap();

    assert_eq!(deleted.secret.name, "db-password");
    assert_eq!(deleted.secret.attributes.recoverable_days, Some(90));
    assert_eq!(
        deleted.deletion.scheduled_purge_date,
        Some(Utc.with_ymd_and_hms(2024, 5, 30, 8, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn vault_create_renders_flags() {
    let (runner, client) = client();
    runner.respond_json(
        &["keyvault", "create"],
        r#"{"id": "/subscriptions/s/resourceGroups/rg-prod/providers/Microsoft.KeyVault/vaults/team-kv",
            "name": "team-kv", "location": "westeurope",
            "properties": {"vaultUri": "https://team-kv.vault.azure.net/", "enableRbacAuthorization": true}}"#,
    );

    let vault = client
        .vaults
        .create(&VaultCreateInput {
            name: "team-kv".into(),
            resource_group: "rg-prod".into(),
            location: "westeurope".into(),
            enable_rbac_authorization: true,
            enable_purge_protection: true,
            retention_days: Some(30),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(vault.resource_group.as_deref(), Some("rg-prod"));
    assert_eq!(vault.vault_uri.as_deref(), Some("https://team-kv.vault.azure.net/"));

    let call = runner.last_call().unwrap();
    assert_eq!(call.value_of("--sku"), Some("standard"));
    assert_eq!(call.value_of("--enable-rbac-authorization"), Some("true"));
    assert_eq!(call.value_of("--enable-purge-protection"), Some("true"));
    assert_eq!(call.value_of("--retention-days"), Some("30"));
}

#[tokio::test]
async fn account_show_and_role_assignments() {
    let (runner, client) = client();
    runner.respond_json(
        &["account", "show"],
        r#"{"environmentName": "AzureCloud", "id": "0b1f6471-1bf0-4dda-aec3-cb9272f09590",
            "isDefault": true, "name": "Dev", "state": "Enabled",
            "tenantId": "72f988bf-86f1-41af-91ab-2d7cd011db47",
            "user": {"name": "ada@contoso.com", "type": "user"}}"#,
    );
    runner.respond_json(
        &["role", "assignment", "list"],
        r#"[{"id": "/subscriptions/s/providers/Microsoft.Authorization/roleAssignments/1",
             "principalName": "ada@contoso.com", "roleDefinitionName": "Key Vault Administrator",
             "scope": "/subscriptions/s"}]"#,
    );

    let account = client.account.show().await.unwrap();
    assert_eq!(account.tenant_id, "72f988bf-86f1-41af-91ab-2d7cd011db47");
    assert_eq!(account.user.unwrap().name, "ada@contoso.com");

    let roles = client
        .account
        .role_assignments("ada@contoso.com", None)
        .await
        .unwrap();
    assert_eq!(roles[0].role_definition_name, "Key Vault Administrator");
    assert!(runner.last_call().unwrap().argv().contains(&"--all".to_string()));
}
