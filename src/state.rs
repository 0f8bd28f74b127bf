use std::sync::Arc;

use crate::{config::Config, quiz::QuizService, store::redis::RedisStore};

pub struct AppState {
    pub config: Config,
    pub quiz: QuizService,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store = RedisStore::connect(&config.redis_url).await;
        let quiz = QuizService::new(Arc::new(store));

        Arc::new(Self { config, quiz })
    }
}
