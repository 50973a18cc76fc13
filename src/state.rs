use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::archive::ArchiveService;
use crate::config::Config;
use crate::posts::PostService;
use crate::social::SocialService;
use crate::store::DynAssetStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub assets: DynAssetStore,
    pub posts: PostService,
    pub social: SocialService,
    pub archive: ArchiveService,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, assets: DynAssetStore) -> Self {
        Self {
            posts: PostService::new(db.clone(), assets.clone()),
            social: SocialService::new(db.clone()),
            archive: ArchiveService::new(db.clone()),
            db,
            config,
            assets,
        }
    }
}
