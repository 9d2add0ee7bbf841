//! Repository layer for data access

pub mod campaigns;
pub mod emails;
pub mod events;

// Re-export concrete repository implementations with simple names
pub use campaigns::DbCampaignMessageRepository as CampaignMessageRepository;
pub use emails::DbEmailRepository as EmailRepository;
pub use events::DbDeliveryEventRepository as DeliveryEventRepository;

// Re-export repository traits
pub use campaigns::CampaignMessageRepository as CampaignMessageRepositoryTrait;
pub use emails::EmailRepository as EmailRepositoryTrait;
pub use events::DeliveryEventRepository as DeliveryEventRepositoryTrait;
