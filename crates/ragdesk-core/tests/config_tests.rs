use figment::Jail;

use ragdesk_core::config::{resolve_with_base, Config, EmbeddingBackend};
use ragdesk_core::types::ChunkStrategy;

#[test]
fn defaults_apply_without_any_file() {
    Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;

        assert_eq!(settings.retrieval.top_k, 4);
        assert_eq!(settings.chunking.max_len, 500);
        assert_eq!(settings.embedding.backend, EmbeddingBackend::Hashing);
        assert_eq!(settings.embedding.batch_size, 64);
        assert_eq!(settings.conversation.history_limit, 5);
        assert!(!settings.escalation.skip_when_context_empty);
        assert_eq!(
            settings.escalation.handoff_message,
            "Your request has been forwarded to a human agent via email."
        );
        Ok(())
    });
}

#[test]
fn env_file_and_variables_override_in_order() {
    Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file(
            "config.toml",
            r#"
            [corpus]
            default_strategy = "sentence"

            [corpus.strategies]
            faq = "title"

            [retrieval]
            top_k = 6
            "#,
        )?;
        jail.create_file("config.test.toml", "[retrieval]\ntop_k = 3\n")?;
        jail.set_env("APP_CHUNKING__MAX_LEN", "250");

        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;

        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.chunking.max_len, 250);
        let strategies = settings.corpus.strategy_map();
        assert_eq!(strategies.resolve("faq"), Some(ChunkStrategy::Title));
        assert_eq!(strategies.resolve("policy"), Some(ChunkStrategy::Sentence));

        let top_k: usize = config.get("retrieval.top_k").map_err(|e| e.to_string())?;
        assert_eq!(top_k, 3);
        Ok(())
    });
}

#[test]
fn production_rejects_hashing_embedder() {
    Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "prod");
        assert!(Config::load().is_err());

        jail.create_file("config.prod.toml", "[embedding]\nbackend = \"bert\"\n")?;
        let config = Config::load().map_err(|e| e.to_string())?;
        assert_eq!(config.env_name(), "prod");
        Ok(())
    });
}

#[test]
fn invalid_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.set_env("APP_EMBEDDING__BATCH_SIZE", "0");
        assert!(Config::load().is_err());
        Ok(())
    });
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = std::path::Path::new("/srv/ragdesk");
    assert_eq!(resolve_with_base(base, "data/output"), base.join("data/output"));
    assert_eq!(resolve_with_base(base, "/var/db.sqlite"), std::path::PathBuf::from("/var/db.sqlite"));
}
