//! Resource documents served by the REST API.

pub mod analytics;
pub mod crm;
pub mod monetization;
pub mod platform;
pub mod product;
pub mod publishing;

pub use analytics::{Country, DeviceAnalytics, TrafficChannel};
pub use crm::{Lead, Notification};
pub use monetization::Statement;
pub use platform::{DataWarehouse, IntegrationHub, SecurityConfiguration, WhiteLabelConfig};
pub use product::{
    Compatibility, ProductActivity, ProductDraft, ProductPurchaseHistory, ProductShare,
    ProductTrafficSource, ProductViewer,
};
pub use publishing::SocialPost;
