pub mod memory;
pub mod model;
pub mod repository;

// 公開APIの再エクスポート

// model.rsから
pub use model::{parse_published_at, Article, ArticleDraft, ArticlePayload, ValidationError};

// repository.rsから
pub use repository::{ArticleStore, PgArticleStore, StoreError, StoreResult};

// memory.rsから
pub use memory::InMemoryArticleStore;
