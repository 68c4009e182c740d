use crate::errors::BotError;
use crate::managers::postgres::PostgresEntityStore;
use crate::managers::replication_log::ReplicationLog;
use crate::managers::ssh::{CommandGateway, SshGateway};
use crate::services::commands::command_list;
use crate::services::config::{BotConfig, StoreKind};
use crate::services::conversation::ConversationEngine;
use crate::services::dispatcher::Dispatcher;
use crate::services::logger::Logger;
use crate::services::telegram::TelegramTransport;
use crate::stores::memory_entity_store::MemoryEntityStore;
use crate::stores::EntityStore;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub transport: Arc<TelegramTransport>,
    pub dispatcher: Dispatcher,
}

impl App {
    pub async fn initialize(config: BotConfig) -> Result<Self, BotError> {
        let mut logger = Logger::new("opsbot");
        if let Some(path) = config.log_file.as_ref() {
            logger = logger.with_file(path).map_err(|err| {
                BotError::config(format!("Cannot open BOT_LOG_FILE {}: {}", path.display(), err))
            })?;
        }

        let gateway: Arc<dyn CommandGateway> =
            Arc::new(SshGateway::new(logger.clone(), config.ssh.clone()));
        let store: Arc<dyn EntityStore> = match config.store {
            StoreKind::Postgres => {
                Arc::new(PostgresEntityStore::new(logger.clone(), &config.database))
            }
            StoreKind::Memory => Arc::new(MemoryEntityStore::new()),
        };
        if config.database.init_schema {
            if let Err(err) = store.ensure_schema().await {
                logger.error(
                    "schema initialization failed",
                    Some(&serde_json::json!({ "error": err.message })),
                );
            }
        }

        let repl_log = ReplicationLog::new(logger.clone(), config.repl_log_path.clone());
        let engine = Arc::new(ConversationEngine::new(
            logger.clone(),
            gateway,
            store,
            repl_log,
        ));
        let transport = Arc::new(TelegramTransport::new(logger.clone(), &config.telegram)?);
        let dispatcher = Dispatcher::new(
            logger.clone(),
            engine,
            transport.clone(),
            config.session_idle,
        );

        logger.info(
            "initialized",
            Some(&serde_json::json!({
                "store": format!("{:?}", config.store),
                "ssh_host": config.ssh.host,
                "host_key_policy": format!("{:?}", config.ssh.host_key_policy),
            })),
        );
        Ok(Self {
            logger,
            transport,
            dispatcher,
        })
    }

    pub async fn run(&self) -> Result<(), BotError> {
        let me = self.transport.get_me().await?;
        self.logger.info(
            "bot authorized",
            Some(&serde_json::json!({ "id": me.id, "username": me.username })),
        );
        if let Err(err) = self.transport.set_my_commands(&command_list()).await {
            self.logger.warn(
                "failed to register command list",
                Some(&serde_json::json!({ "error": err.message })),
            );
        }

        tokio::select! {
            _ = self.dispatcher.run() => {}
            _ = tokio::signal::ctrl_c() => {
                self.logger.info("shutdown requested", Some(&self.logger.stats()));
            }
        }
        Ok(())
    }
}

pub async fn run() -> Result<(), BotError> {
    let config = BotConfig::from_env()?;
    let app = App::initialize(config).await?;
    app.run().await
}
