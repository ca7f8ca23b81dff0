// refguard-core/src/ports/dataset.rs

use async_trait::async_trait;

use crate::domain::dataset::Dataset;
use crate::error::RefGuardError;

#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Instrument rows for one (product type, exchange).
    /// Unreachable sources surface as `RefGuardError::DataSource`.
    async fn load(&self, product_type: &str, exchange: &str) -> Result<Dataset, RefGuardError>;

    fn provider_name(&self) -> &str;
}
