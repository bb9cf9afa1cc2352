use mongodb::{Client, Collection, Database};
use std::error::Error;

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool: every live feed keeps a change stream cursor open
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        // Database name comes from the URI path
        let db_name = uri
            .split('/')
            .last()
            .and_then(|s| s.split('?').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("forum");

        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the feed and cascade queries rely on
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        use mongodb::bson::doc;
        use mongodb::IndexModel;

        log::info!("🔧 Creating database indexes...");

        // posts(timestamp desc) - live forum feed ordering
        let posts = self.collection::<mongodb::bson::Document>("posts");
        let posts_index = IndexModel::builder()
            .keys(doc! { "timestamp": -1 })
            .build();

        match posts.create_index(posts_index).await {
            Ok(_) => log::info!("   ✅ Index created: posts(timestamp)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        // posts(deleting) - sweeper looks for interrupted cascade deletes
        let deleting_index = IndexModel::builder()
            .keys(doc! { "deleting": 1 })
            .build();

        match posts.create_index(deleting_index).await {
            Ok(_) => log::info!("   ✅ Index created: posts(deleting)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        // comments(_parent, timestamp) - subcollection scans per post
        let comments = self.collection::<mongodb::bson::Document>("comments");
        let comments_index = IndexModel::builder()
            .keys(doc! { "_parent": 1, "timestamp": 1 })
            .build();

        match comments.create_index(comments_index).await {
            Ok(_) => log::info!("   ✅ Index created: comments(_parent, timestamp)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}
