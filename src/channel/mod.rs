pub mod error;
pub mod record;
pub mod store;

pub use error::ChannelError;
pub use record::ChannelRecord;
pub use store::{ChannelPayload, ChannelStore, is_valid_client_id};
